//! HTTP surface: one route per function, sharing [`AppState`].
//!
//! | Route | Methods | CORS |
//! |-------|---------|------|
//! | `/shopify_auth` | GET, POST | standard |
//! | `/shopify_callback` | GET | standard |
//! | `/shopify_finalize` | POST | standard |
//! | `/check_user_status` | POST | standard |
//! | `/fetch_affiliate_stats` | POST | standard |
//! | `/ikas_connect` | POST | standard |
//! | `/track_checkout` | POST | ingestion |
//! | `/health` | GET | none |

mod account;
mod cors;
mod error;
mod ingest;
mod oauth;
mod state;

use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

pub use error::{AppError, Result};
pub use state::AppState;

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    let standard = Router::new()
        .route(
            "/shopify_auth",
            get(oauth::initiate_get)
                .post(oauth::initiate_post)
                .fallback(method_not_allowed),
        )
        .route(
            "/shopify_callback",
            get(oauth::callback).fallback(method_not_allowed),
        )
        .route(
            "/shopify_finalize",
            post(oauth::finalize_post).fallback(method_not_allowed),
        )
        .route(
            "/check_user_status",
            post(account::check_user_status).fallback(method_not_allowed),
        )
        .route(
            "/fetch_affiliate_stats",
            post(account::fetch_affiliate_stats).fallback(method_not_allowed),
        )
        .route(
            "/ikas_connect",
            post(account::ikas_connect).fallback(method_not_allowed),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            cors::standard_cors,
        ));

    let ingestion = Router::new()
        .route(
            "/track_checkout",
            post(ingest::track).fallback(method_not_allowed),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            cors::ingestion_cors,
        ));

    Router::new()
        .merge(standard)
        .merge(ingestion)
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

/// Parses a JSON request body; an empty body reads as `T::default()`.
fn json_body<T>(body: &[u8]) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|_| AppError::BadRequest("Invalid JSON".to_string()))
}
