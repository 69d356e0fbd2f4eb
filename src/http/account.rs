//! Account route handlers: status, statistics and Ikas connection.

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use chrono::Utc;
use serde::Deserialize;

use crate::auth::{account_status, AccountId, AccountStatus, CredentialError};
use crate::http::error::Result;
use crate::http::{json_body, AppState};
use crate::ingest::{fetch_shop_stats, ShopStats};
use crate::platforms::{connect_ikas, IkasConnectRequest, IkasConnected};

/// Body of requests authenticated only by a credential.
#[derive(Debug, Default, Deserialize)]
struct CredentialBody {
    #[serde(default)]
    credential: Option<String>,
    #[serde(default, rename = "idToken")]
    id_token_camel: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
}

impl CredentialBody {
    fn into_token(self) -> Option<String> {
        [self.credential, self.id_token_camel, self.id_token]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
}

async fn authenticate(state: &AppState, headers: &HeaderMap, body: &Bytes) -> Result<AccountId> {
    let parsed: CredentialBody = json_body(body)?;
    let token = parsed
        .into_token()
        .or_else(|| bearer_token(headers))
        .ok_or(CredentialError::Missing)?;
    let account = state
        .verifier()
        .verify(&token)
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "Failed to verify credential"))?;
    Ok(account)
}

/// `POST /check_user_status`.
#[tracing::instrument(skip_all)]
pub async fn check_user_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AccountStatus>> {
    let account = authenticate(&state, &headers, &body).await?;
    let status = account_status(state.accounts(), &account).await?;
    tracing::info!(account = %account, verified = status.verified, "User status checked");
    Ok(Json(status))
}

/// `POST /fetch_affiliate_stats`.
#[tracing::instrument(skip_all)]
pub async fn fetch_affiliate_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ShopStats>> {
    let account = authenticate(&state, &headers, &body).await?;
    let stats = fetch_shop_stats(state.accounts(), state.events(), &account).await?;
    tracing::info!(
        account = %account,
        shop_key = %stats.shop_key,
        total = stats.total_checkout_events,
        "Fetched shop statistics"
    );
    Ok(Json(stats))
}

/// `POST /ikas_connect`.
#[tracing::instrument(skip_all)]
pub async fn ikas_connect(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<IkasConnected>> {
    let mut request: IkasConnectRequest = json_body(&body)?;
    if request.credential.is_none() {
        request.credential = bearer_token(&headers);
    }
    let connected = connect_ikas(
        state.ikas(),
        state.verifier(),
        state.accounts(),
        &request,
        Utc::now(),
    )
    .await?;
    Ok(Json(connected))
}
