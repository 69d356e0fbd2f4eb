//! Errors raised by the verification handshake.
//!
//! # Example
//!
//! ```rust
//! use shop_verify::auth::oauth::OAuthError;
//!
//! let error = OAuthError::InvalidHmac;
//! assert_eq!(error.to_string(), "HMAC verification failed");
//! ```

use thiserror::Error;

use crate::auth::CredentialError;
use crate::store::StoreError;

/// Errors that can occur during Initiate, Callback or Finalize.
///
/// Every variant except [`OAuthError::Credential`] and [`OAuthError::Store`]
/// is a client error with a short, safe message.
#[derive(Debug, Error)]
pub enum OAuthError {
    /// The shop does not match the shop domain grammar.
    #[error("Invalid shop domain")]
    InvalidShopDomain,

    /// The return URL is not on the trusted host allowlist.
    #[error("Invalid return URL - must be from a trusted origin")]
    UntrustedReturnUrl,

    /// The callback lacks `shop`, `hmac` or `state`.
    #[error("Missing required params")]
    MissingCallbackParams,

    /// The callback signature did not verify.
    #[error("HMAC verification failed")]
    InvalidHmac,

    /// The callback's shop differs from the shop the state was issued for.
    #[error("State does not belong to this shop")]
    ShopMismatch,

    /// Finalize was called without a state id.
    #[error("Missing state")]
    MissingState,

    /// No state with the given id exists.
    #[error("Invalid or expired state")]
    InvalidOrExpiredState,

    /// The state exists but the callback has not verified it.
    #[error("Shop not verified by Shopify")]
    NotVerified,

    /// The verified state has no shop.
    #[error("State missing shop")]
    StateMissingShop,

    /// The caller's credential was rejected.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// Verify OAuthError is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<OAuthError>();
};
