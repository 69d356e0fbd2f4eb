//! Integration tests for the shop verification handshake.
//!
//! Drives Initiate, Callback and Finalize through the router and checks:
//! - The full happy path binds the shop to the caller's account
//! - Untrusted return URLs are rejected before any state is written
//! - A tampered signature leaves the state untouched
//! - Finalize refuses unverified, consumed and unknown states
//! - Repeated Initiates keep a single pending state

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::json;
use shop_verify::auth::oauth::StateId;
use shop_verify::store::{AccountStore, VerificationStore};
use shop_verify::AccountId;

use common::*;

#[tokio::test]
async fn test_initiate_callback_finalize_binds_shop() {
    let (app, store) = app();
    let shop = "demo-store.myshopify.com";

    let state = initiate(&app, shop, Some("https://preview.vercel.app/onboarding")).await;

    let query = signed_callback_query(shop, &state, API_SECRET);
    let response = get(&app, &format!("/shopify_callback?{query}")).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
    assert_eq!(
        location,
        format!("https://preview.vercel.app/dashboard?shop={shop}&state={state}")
    );
    assert!(body_text(response).await.is_empty());

    let response = post_json(
        &app,
        "/shopify_finalize",
        &json!({ "idToken": credential("merchant-1"), "state": state }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "OK");

    let account = AccountId::new("merchant-1").unwrap();
    let bindings = store.list_bindings(&account).await.unwrap();
    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings[0].shop, shop);
    assert!(bindings[0].verified);
    let record = store.get_account(&account).await.unwrap().unwrap();
    assert_eq!(record.shop.as_deref(), Some(shop));
    assert!(record.verified);

    let state_id = StateId::from_raw(state).unwrap();
    assert!(store.get_state(&state_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_callback_without_return_url_uses_frontend_url() {
    let (app, _store) = app();
    let shop = "demo-store.myshopify.com";
    let state = initiate(&app, shop, None).await;

    let response = get(
        &app,
        &format!("/shopify_callback?{}", signed_callback_query(shop, &state, API_SECRET)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with(&format!("{FRONTEND_URL}/dashboard?shop=")));
}

#[tokio::test]
async fn test_initiate_accepts_get_query_and_form_post() {
    let (app, store) = app();

    let response = get(&app, "/shopify_auth?shop=Query-Shop.myshopify.com").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    let redirect = json["redirect_url"].as_str().unwrap();
    assert!(redirect.starts_with(
        "https://query-shop.myshopify.com/admin/oauth/authorize?client_id=test-api-key"
    ));

    let response = send(
        &app,
        Request::builder()
            .method(Method::POST)
            .uri("/shopify_auth")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("shop_domain=form-shop.myshopify.com"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(store.state_count().await, 2);
}

#[tokio::test]
async fn test_untrusted_return_url_writes_no_state() {
    let (app, store) = app();

    for return_url in [
        "https://evil.example.com/phish",
        "javascript:alert(1)",
        "https://vercel.app.evil.com/",
    ] {
        let response = post_json(
            &app,
            "/shopify_auth",
            &json!({ "shop": "demo-store.myshopify.com", "return_url": return_url }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{return_url}");
        let json = body_json(response).await;
        assert_eq!(
            json["error"],
            "Invalid return URL - must be from a trusted origin"
        );
    }

    assert_eq!(store.state_count().await, 0);
}

#[tokio::test]
async fn test_invalid_shop_domain_is_rejected() {
    let (app, store) = app();
    for shop in ["demo-store", "shop.example.com", "-bad.myshopify.com", ""] {
        let response = post_json(&app, "/shopify_auth", &json!({ "shop": shop })).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{shop}");
    }
    assert_eq!(store.state_count().await, 0);
}

#[tokio::test]
async fn test_repeated_initiate_keeps_one_pending_state() {
    let (app, store) = app();
    let shop = "demo-store.myshopify.com";

    let first = initiate(&app, shop, None).await;
    let second = initiate(&app, shop, None).await;
    assert_ne!(first, second);
    assert_eq!(store.state_count().await, 1);

    let first = StateId::from_raw(first).unwrap();
    let second = StateId::from_raw(second).unwrap();
    assert!(store.get_state(&first).await.unwrap().is_none());
    assert!(store.get_state(&second).await.unwrap().is_some());
}

#[tokio::test]
async fn test_already_verified_shop_short_circuits() {
    let (app, store) = app();
    let shop = "demo-store.myshopify.com";
    let state = initiate(&app, shop, None).await;
    get(
        &app,
        &format!("/shopify_callback?{}", signed_callback_query(shop, &state, API_SECRET)),
    )
    .await;

    let response = post_json(&app, "/shopify_auth", &json!({ "shop_domain": shop })).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["already_verified"], true);
    assert_eq!(json["message"], "This shop is already verified");
    assert_eq!(store.state_count().await, 1);
}

#[tokio::test]
async fn test_tampered_hmac_leaves_state_unverified() {
    let (app, store) = app();
    let shop = "demo-store.myshopify.com";
    let state = initiate(&app, shop, None).await;

    let query = signed_callback_query(shop, &state, API_SECRET);
    let (prefix, digest) = query.rsplit_once("hmac=").unwrap();
    let mut bytes = hex::decode(digest).unwrap();
    bytes[0] ^= 0x01;
    let tampered = format!("{prefix}hmac={}", hex::encode(bytes));

    let response = get(&app, &format!("/shopify_callback?{tampered}")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "HMAC verification failed");

    let state_id = StateId::from_raw(state).unwrap();
    let stored = store.get_state(&state_id).await.unwrap().unwrap();
    assert!(!stored.verified);
    assert!(stored.verified_at.is_none());
}

#[tokio::test]
async fn test_callback_signed_with_wrong_secret_is_rejected() {
    let (app, _store) = app();
    let shop = "demo-store.myshopify.com";
    let state = initiate(&app, shop, None).await;

    let response = get(
        &app,
        &format!("/shopify_callback?{}", signed_callback_query(shop, &state, "other-secret")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_callback_missing_params() {
    let (app, _store) = app();
    let response = get(&app, "/shopify_callback?shop=demo-store.myshopify.com").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Missing required params");
}

#[tokio::test]
async fn test_callback_for_unknown_state_creates_verified_state() {
    let (app, store) = app();
    let shop = "demo-store.myshopify.com";
    let state = StateId::generate();

    let response = get(
        &app,
        &format!(
            "/shopify_callback?{}",
            signed_callback_query(shop, state.as_ref(), API_SECRET)
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let stored = store.get_state(&state).await.unwrap().unwrap();
    assert!(stored.verified);
    assert_eq!(stored.shop.unwrap().as_ref(), shop);
}

#[tokio::test]
async fn test_finalize_on_unverified_state_binds_nothing() {
    let (app, store) = app();
    let state = initiate(&app, "demo-store.myshopify.com", None).await;

    let response = post_json(
        &app,
        "/shopify_finalize",
        &json!({ "credential": credential("merchant-1"), "state": state }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Shop not verified by Shopify");

    let account = AccountId::new("merchant-1").unwrap();
    assert!(store.list_bindings(&account).await.unwrap().is_empty());
    assert_eq!(store.state_count().await, 1);
}

#[tokio::test]
async fn test_finalize_consumed_and_unknown_states_fail_identically() {
    let (app, _store) = app();
    let shop = "demo-store.myshopify.com";
    let state = initiate(&app, shop, None).await;
    get(
        &app,
        &format!("/shopify_callback?{}", signed_callback_query(shop, &state, API_SECRET)),
    )
    .await;

    let first = post_json(
        &app,
        "/shopify_finalize",
        &json!({ "credential": credential("merchant-1"), "state_id": state }),
    )
    .await;
    assert_eq!(first.status(), StatusCode::OK);

    let replay = post_json(
        &app,
        "/shopify_finalize",
        &json!({ "credential": credential("merchant-2"), "state_id": state }),
    )
    .await;
    let unknown = post_json(
        &app,
        "/shopify_finalize",
        &json!({ "credential": credential("merchant-2"), "state_id": "never-issued" }),
    )
    .await;

    assert_eq!(replay.status(), StatusCode::BAD_REQUEST);
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(replay).await, body_json(unknown).await);
}

#[tokio::test]
async fn test_finalize_requires_valid_credential() {
    let (app, _store) = app();

    let response = post_json(&app, "/shopify_finalize", &json!({ "state": "abc" })).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = post_json(
        &app,
        "/shopify_finalize",
        &json!({ "credential": "not-a-jwt", "state": "abc" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = post_json(
        &app,
        "/shopify_finalize",
        &json!({ "credential": credential("merchant-1") }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_wrong_method_is_405() {
    let (app, _store) = app();
    let response = get(&app, "/shopify_finalize").await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body_json(response).await["error"], "Method Not Allowed");
}
