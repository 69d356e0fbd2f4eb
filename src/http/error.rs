//! Mapping of domain errors onto HTTP responses.
//!
//! Every handler returns `Result<_, AppError>`. Client errors carry their
//! message in a `{"error": ...}` body; server errors are logged in full and
//! answered with a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::auth::oauth::OAuthError;
use crate::auth::CredentialError;
use crate::ingest::{IngestError, StatsError};
use crate::platforms::IkasError;
use crate::store::StoreError;

const INTERNAL_ERROR_MESSAGE: &str = "Internal Server Error";

/// Error type returned by all handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// Shop verification handshake failed.
    #[error(transparent)]
    OAuth(#[from] OAuthError),

    /// Bearer credential was missing or rejected.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// Checkout report was rejected.
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Statistics lookup failed.
    #[error(transparent)]
    Stats(#[from] StatsError),

    /// Ikas connection failed.
    #[error(transparent)]
    Ikas(#[from] IkasError),

    /// Store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Malformed request body.
    #[error("{0}")]
    BadRequest(String),

    /// Route exists but not for this method.
    #[error("Method Not Allowed")]
    MethodNotAllowed,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::OAuth(err) => match err {
                OAuthError::Credential(_) => StatusCode::UNAUTHORIZED,
                OAuthError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            },
            Self::Credential(_) => StatusCode::UNAUTHORIZED,
            Self::Ingest(err) => match err {
                IngestError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            },
            Self::Stats(err) => match err {
                StatsError::AccountNotFound => StatusCode::NOT_FOUND,
                StatsError::NoVerifiedShop | StatsError::NotVerified => StatusCode::FORBIDDEN,
                StatsError::InvalidShopName => StatusCode::BAD_REQUEST,
                StatsError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Ikas(err) => match err {
                IkasError::Credential(_) => StatusCode::UNAUTHORIZED,
                IkasError::Unreachable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                IkasError::Client { .. } | IkasError::Store(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                IkasError::MissingFields
                | IkasError::InvalidShopName { .. }
                | IkasError::Rejected { .. }
                | IkasError::MissingAccessToken => StatusCode::BAD_REQUEST,
            },
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::OAuth(OAuthError::Credential(_))
            | Self::Credential(_)
            | Self::Ikas(IkasError::Credential(_)) => "Invalid or missing credential".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!(error = %self, error_debug = ?self, "Request failed");
            INTERNAL_ERROR_MESSAGE.to_string()
        } else {
            if status == StatusCode::SERVICE_UNAVAILABLE {
                tracing::error!(error = %self, "Upstream unavailable");
            }
            self.client_message()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;
