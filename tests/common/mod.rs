//! Shared helpers for router-level integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, Response, StatusCode};
use axum::Router;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use shop_verify::auth::oauth::hmac::compute_signature;
use shop_verify::auth::oauth::CallbackQuery;
use shop_verify::http::{router, AppState};
use shop_verify::store::MemoryStore;
use shop_verify::{ApiKey, ApiSecretKey, FunctionsConfig, HostUrl};
use tower::ServiceExt;

pub const API_SECRET: &str = "shopify-test-secret";
pub const CREDENTIAL_SECRET: &str = "credential-test-secret";
pub const FRONTEND_URL: &str = "https://app.konsiyer.com";

pub fn config_with_ikas(ikas_token_url: Option<String>) -> FunctionsConfig {
    let mut builder = FunctionsConfig::builder()
        .api_key(ApiKey::new("test-api-key").unwrap())
        .api_secret_key(ApiSecretKey::new(API_SECRET).unwrap())
        .redirect_uri(HostUrl::new("https://functions.example.com/shopify_callback").unwrap())
        .frontend_url(HostUrl::new(format!("{FRONTEND_URL}/")).unwrap())
        .credential_secret(ApiSecretKey::new(CREDENTIAL_SECRET).unwrap())
        .ikas_timeout(Duration::from_secs(2));
    if let Some(url) = ikas_token_url {
        builder = builder.ikas_token_url(url);
    }
    builder.build().unwrap()
}

pub fn config() -> FunctionsConfig {
    config_with_ikas(None)
}

/// Router over a fresh in-memory store, returned with the store for inspection.
pub fn app_with(config: FunctionsConfig) -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(config, store.clone()).unwrap();
    (router(state), store)
}

pub fn app() -> (Router, Arc<MemoryStore>) {
    app_with(config())
}

/// Signed credential for `account`.
pub fn credential(account: &str) -> String {
    let exp = chrono::Utc::now().timestamp() + 3600;
    encode(
        &Header::default(),
        &json!({ "sub": account, "exp": exp }),
        &EncodingKey::from_secret(CREDENTIAL_SECRET.as_bytes()),
    )
    .unwrap()
}

/// Query string for a callback signed with `secret`.
pub fn signed_callback_query(shop: &str, state: &str, secret: &str) -> String {
    let mut query = CallbackQuery::from_pairs([
        ("code", "auth-code-123"),
        ("shop", shop),
        ("state", state),
        ("timestamp", "1700000000"),
    ]);
    let hmac = compute_signature(&query.to_signable_string(), secret);
    query.insert("hmac", hmac);

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for key in ["code", "shop", "state", "timestamp", "hmac"] {
        if let Some(value) = query.get(key) {
            serializer.append_pair(key, value);
        }
    }
    serializer.finish()
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(
        app,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await
}

pub async fn post_json(app: &Router, uri: &str, body: &Value) -> Response<Body> {
    send(
        app,
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Runs Initiate for `shop` and returns the state id from the authorize URL.
pub async fn initiate(app: &Router, shop: &str, return_url: Option<&str>) -> String {
    let mut body = json!({ "shop": shop });
    if let Some(url) = return_url {
        body["return_url"] = json!(url);
    }
    let response = post_json(app, "/shopify_auth", &body).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let redirect = url::Url::parse(json["redirect_url"].as_str().unwrap()).unwrap();
    redirect
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap()
}
