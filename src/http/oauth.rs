//! Shop verification route handlers.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;

use crate::auth::oauth::{
    finalize, handle_callback, initiate, CallbackQuery, FinalizeRequest, InitiateOutcome,
    InitiateRequest,
};
use crate::http::error::Result;
use crate::http::{json_body, AppState};

/// `GET /shopify_auth`: Initiate from query parameters.
#[tracing::instrument(skip_all)]
pub async fn initiate_get(
    State(state): State<AppState>,
    Query(query): Query<InitiateRequest>,
) -> Result<Json<InitiateOutcome>> {
    let outcome = initiate(state.config(), state.states(), &query, Utc::now()).await?;
    Ok(Json(outcome))
}

/// `POST /shopify_auth`: Initiate from a JSON or form body, falling back to
/// query parameters for fields the body omits.
#[tracing::instrument(skip_all)]
pub async fn initiate_post(
    State(state): State<AppState>,
    Query(query): Query<InitiateRequest>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<InitiateOutcome>> {
    let request = merge(initiate_body(&headers, &body), query);
    let outcome = initiate(state.config(), state.states(), &request, Utc::now()).await?;
    Ok(Json(outcome))
}

fn initiate_body(headers: &HeaderMap, body: &[u8]) -> InitiateRequest {
    let is_form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

    if is_form {
        let mut request = InitiateRequest::default();
        for (key, value) in url::form_urlencoded::parse(body) {
            let value = Some(value.into_owned());
            match key.as_ref() {
                "shop" => request.shop = value,
                "shop_domain" => request.shop_domain = value,
                "return_url" => request.return_url = value,
                _ => {}
            }
        }
        request
    } else {
        serde_json::from_slice(body).unwrap_or_default()
    }
}

fn merge(body: InitiateRequest, query: InitiateRequest) -> InitiateRequest {
    InitiateRequest {
        shop: body.shop.or(query.shop),
        shop_domain: body.shop_domain.or(query.shop_domain),
        return_url: body.return_url.or(query.return_url),
    }
}

/// `GET /shopify_callback`: verify the signed redirect and send the browser
/// on to the dashboard.
#[tracing::instrument(skip_all)]
pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response> {
    let location = handle_callback(state.config(), state.states(), &query, Utc::now()).await?;
    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}

/// `POST /shopify_finalize`: bind the verified shop to the caller's account.
#[tracing::instrument(skip_all)]
pub async fn finalize_post(State(state): State<AppState>, body: Bytes) -> Result<&'static str> {
    let request: FinalizeRequest = json_body(&body)?;
    finalize(
        state.verifier(),
        state.states(),
        state.accounts(),
        &request,
        Utc::now(),
    )
    .await?;
    Ok("OK")
}
