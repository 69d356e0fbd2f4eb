//! Checkout ingestion route handler.

use axum::{body::Bytes, extract::State, Json};
use chrono::Utc;

use crate::http::error::Result;
use crate::http::AppState;
use crate::ingest::{track_checkout, TrackOutcome};

/// `POST /track_checkout`.
///
/// Reads the raw body so that `text/plain` beacons are accepted.
#[tracing::instrument(skip_all, fields(bytes = body.len()))]
pub async fn track(State(state): State<AppState>, body: Bytes) -> Result<Json<TrackOutcome>> {
    let outcome = track_checkout(state.events(), &body, Utc::now())
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "Checkout event rejected"))?;
    Ok(Json(outcome))
}
