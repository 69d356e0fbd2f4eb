//! CORS middleware.
//!
//! Two policies share the same preflight handling and static headers:
//!
//! - [`standard_cors`]: allowlisted origins are echoed with credentials,
//!   everything else gets `*`
//! - [`ingestion_cors`]: for beacon senders posting with credentials from
//!   arbitrary storefronts; allowlisted origins are echoed with credentials,
//!   other origins are echoed without, and a request without `Origin` gets no
//!   allow-origin header at all

use axum::{
    body::Body,
    extract::{Request, State},
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
            ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
            ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE, ORIGIN, VARY,
        },
        HeaderMap, HeaderValue, Method, StatusCode,
    },
    middleware::Next,
    response::Response,
};

use crate::config::AllowedOrigins;
use crate::http::AppState;

const ALLOW_METHODS: &str = "GET, POST, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Authorization";
const EXPOSE_HEADERS: &str = "Location";
const MAX_AGE: &str = "3600";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Policy {
    Standard,
    Ingestion,
}

/// CORS for the verification and account routes.
pub async fn standard_cors(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    apply(state.config().allowed_origins(), Policy::Standard, request, next).await
}

/// CORS for the checkout ingestion route.
pub async fn ingestion_cors(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    apply(state.config().allowed_origins(), Policy::Ingestion, request, next).await
}

async fn apply(allowed: &AllowedOrigins, policy: Policy, request: Request, next: Next) -> Response {
    let origin = request
        .headers()
        .get(ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    let mut response = if request.method() == Method::OPTIONS {
        let mut preflight = Response::new(Body::empty());
        *preflight.status_mut() = StatusCode::OK;
        preflight
    } else {
        next.run(request).await
    };

    set_headers(response.headers_mut(), allowed, policy, origin.as_deref());
    response
}

fn set_headers(
    headers: &mut HeaderMap,
    allowed: &AllowedOrigins,
    policy: Policy,
    origin: Option<&str>,
) {
    let echoed = origin.and_then(|o| HeaderValue::from_str(o).ok());

    match (origin, echoed) {
        (Some(o), Some(value)) if allowed.permits(o) => {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
            headers.insert(
                ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
            headers.insert(VARY, HeaderValue::from_static("Origin"));
        }
        (Some(_), Some(value)) if policy == Policy::Ingestion => {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
            headers.insert(VARY, HeaderValue::from_static("Origin"));
        }
        _ if policy == Policy::Standard => {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        }
        _ => {}
    }

    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    headers.insert(
        ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static(EXPOSE_HEADERS),
    );
    headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(MAX_AGE));
}
