//! Account credential (ID token) verification.
//!
//! Finalize and the account functions authenticate the caller with a bearer
//! credential. [`CredentialVerifier`] is the seam: production uses
//! [`JwtCredentialVerifier`], which checks an HS256 ID token, and tests can
//! substitute their own implementation.
//!
//! # Claims
//!
//! - `sub` (or `uid`): the account id
//! - `exp`: expiration, validated with a 10 second leeway
//! - `aud`: checked only when an audience is configured; a string or an
//!   array of strings

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::FunctionsConfig;

/// Leeway for time-based claims.
const JWT_LEEWAY_SECS: u64 = 10;

/// Identifier of an authenticated account.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Wraps a non-empty account id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }
}

impl AsRef<str> for AccountId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reasons a credential is rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// No credential was supplied.
    #[error("Missing credential")]
    Missing,

    /// The token failed signature, expiry or format checks.
    #[error("Invalid credential: {reason}")]
    Invalid {
        /// Why the token was rejected.
        reason: String,
    },

    /// The token is valid but names no account.
    #[error("Credential has no subject")]
    MissingSubject,

    /// The token was issued for another audience.
    #[error("Credential audience mismatch")]
    AudienceMismatch,
}

/// Verifies a bearer credential and yields the account it belongs to.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Verifies `token`.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] if the token is not acceptable.
    async fn verify(&self, token: &str) -> Result<AccountId, CredentialError>;
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: Option<String>,
    uid: Option<String>,
    #[serde(default)]
    aud: Option<Audience>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    fn contains(&self, expected: &str) -> bool {
        match self {
            Self::One(aud) => aud == expected,
            Self::Many(auds) => auds.iter().any(|a| a == expected),
        }
    }
}

/// HS256 ID token verifier.
#[derive(Clone)]
pub struct JwtCredentialVerifier {
    key: DecodingKey,
    audience: Option<String>,
}

impl JwtCredentialVerifier {
    /// Creates a verifier for tokens signed with `secret`.
    #[must_use]
    pub fn new(secret: &str, audience: Option<String>) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            audience,
        }
    }

    /// Creates a verifier from the service configuration.
    #[must_use]
    pub fn from_config(config: &FunctionsConfig) -> Self {
        Self::new(
            config.credential_secret().as_ref(),
            config.credential_audience().map(ToString::to_string),
        )
    }

    fn verify_sync(&self, token: &str) -> Result<AccountId, CredentialError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(CredentialError::Missing);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = JWT_LEEWAY_SECS;
        // Audience is checked manually below so that it stays optional
        validation.validate_aud = false;

        let claims = decode::<IdTokenClaims>(token, &self.key, &validation)
            .map_err(|e| CredentialError::Invalid {
                reason: e.to_string(),
            })?
            .claims;

        if let Some(expected) = &self.audience {
            if !claims.aud.as_ref().is_some_and(|aud| aud.contains(expected)) {
                return Err(CredentialError::AudienceMismatch);
            }
        }

        claims
            .sub
            .or(claims.uid)
            .and_then(AccountId::new)
            .ok_or(CredentialError::MissingSubject)
    }
}

impl fmt::Debug for JwtCredentialVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtCredentialVerifier")
            .field("key", &"*****")
            .field("audience", &self.audience)
            .finish()
    }
}

#[async_trait]
impl CredentialVerifier for JwtCredentialVerifier {
    async fn verify(&self, token: &str) -> Result<AccountId, CredentialError> {
        self.verify_sync(token)
    }
}
