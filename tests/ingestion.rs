//! Integration tests for checkout event ingestion.
//!
//! Tests cover:
//! - Duplicate reports are stored once and counted once
//! - `text/plain` beacon bodies are accepted
//! - Validation failures and method restrictions
//! - The ingestion CORS policy

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use shop_verify::ingest::{ShopKey, CHECKOUT_COMPLETED};
use shop_verify::store::CheckoutEventStore;

use common::*;

fn checkout(transaction_id: Value) -> Value {
    json!({
        "event": "purchase",
        "kons_ref": "ref-42",
        "timestamp": "2026-03-01T10:00:00Z",
        "page": "https://demo.myikas.com/checkout/success",
        "ecommerce": {
            "affiliation": "Demo Store!",
            "transaction_id": transaction_id,
            "value": 149.9,
            "currency": "TRY",
            "items": [{ "id": "sku-1" }, { "id": "sku-2" }],
            "customer": { "email": "buyer@example.com", "id": 7 }
        }
    })
}

async fn post_beacon(
    app: &axum::Router,
    body: &str,
    origin: Option<&str>,
) -> axum::http::Response<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/track_checkout")
        .header(header::CONTENT_TYPE, "text/plain;charset=UTF-8");
    if let Some(origin) = origin {
        builder = builder.header(header::ORIGIN, origin);
    }
    send(app, builder.body(Body::from(body.to_string())).unwrap()).await
}

#[tokio::test]
async fn test_duplicate_checkout_is_stored_once() {
    let (app, store) = app();
    let payload = checkout(json!("T-1001"));

    let first = post_json(&app, "/track_checkout", &payload).await;
    assert_eq!(first.status(), StatusCode::OK);
    let first = body_json(first).await;
    assert_eq!(first["success"], true);
    assert_eq!(first["transaction_id"], "T-1001");
    assert_eq!(first["event_id"], "T-1001");
    assert_eq!(first["shop"], "Demo Store!");
    assert_eq!(first["kons_ref"], "ref-42");
    assert!(first.get("duplicate").is_none());

    let second = post_json(&app, "/track_checkout", &payload).await;
    assert_eq!(second.status(), StatusCode::OK);
    let second = body_json(second).await;
    assert_eq!(second["duplicate"], true);
    assert_eq!(second["transaction_id"], "T-1001");

    let key = ShopKey::normalize("Demo Store!").unwrap();
    assert_eq!(key.as_ref(), "demostore");
    let summary = store.get_summary(&key).await.unwrap().unwrap();
    assert_eq!(summary.total_events, 1);
    let events = store.list_events(&key, CHECKOUT_COMPLETED).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].items_count, 2);
    assert_eq!(events[0].customer_email.as_deref(), Some("buyer@example.com"));
}

#[tokio::test]
async fn test_distinct_transactions_are_counted() {
    let (app, store) = app();
    post_json(&app, "/track_checkout", &checkout(json!("T-1"))).await;
    post_json(&app, "/track_checkout", &checkout(json!(2002))).await;

    let key = ShopKey::normalize("demostore").unwrap();
    let summary = store.get_summary(&key).await.unwrap().unwrap();
    assert_eq!(summary.total_events, 2);
}

#[tokio::test]
async fn test_text_plain_beacon_is_accepted() {
    let (app, _store) = app();
    let response = post_beacon(&app, &checkout(json!("T-9")).to_string(), None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_validation_failures() {
    let (app, _store) = app();

    let cases = [
        ("{not json", "Invalid JSON payload"),
        (r#"{"ecommerce": {}}"#, "Missing or invalid ecommerce data"),
        (r#"{"ecommerce": "x"}"#, "Missing or invalid ecommerce data"),
        (
            r#"{"ecommerce": {"transaction_id": "T"}}"#,
            "Missing shop affiliation",
        ),
        (
            r#"{"ecommerce": {"affiliation": "!!!", "transaction_id": "T"}}"#,
            "Invalid shop affiliation",
        ),
        (
            r#"{"ecommerce": {"affiliation": "shop", "transaction_id": ""}}"#,
            "Missing transaction_id",
        ),
    ];

    for (body, message) in cases {
        let response = post_beacon(&app, body, None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(body_json(response).await["error"], message, "{body}");
    }
}

#[tokio::test]
async fn test_get_is_not_allowed() {
    let (app, _store) = app();
    let response = get(&app, "/track_checkout").await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_ingestion_cors_echoes_storefront_origin() {
    let (app, _store) = app();

    let response = post_beacon(
        &app,
        &checkout(json!("T-1")).to_string(),
        Some("https://some-storefront.example"),
    )
    .await;
    let headers = response.headers();
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://some-storefront.example"
    );
    assert!(headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());

    let response = post_beacon(
        &app,
        &checkout(json!("T-2")).to_string(),
        Some("https://demo.myikas.com"),
    )
    .await;
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
        "true"
    );

    let response = post_beacon(&app, &checkout(json!("T-3")).to_string(), None).await;
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

#[tokio::test]
async fn test_preflight_is_answered_without_processing() {
    let (app, store) = app();
    let response = send(
        &app,
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/track_checkout")
            .header(header::ORIGIN, "https://dev-konsiyer.ikas.shop")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_MAX_AGE], "3600");
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS],
        "GET, POST, OPTIONS"
    );
    assert!(body_text(response).await.is_empty());

    let key = ShopKey::normalize("demostore").unwrap();
    assert!(store.get_summary(&key).await.unwrap().is_none());
}
