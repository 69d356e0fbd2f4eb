//! HMAC validation for Shopify OAuth callbacks.
//!
//! Shopify signs the callback query string with the app's client secret. The
//! signature covers every parameter except `hmac` and `signature`, sorted by
//! key and form encoded (see [`CallbackQuery::to_signable_string`]).
//!
//! # Security
//!
//! All comparisons are constant time. When an old secret is configured the
//! signature is also checked against it, so a key rotation does not break
//! handshakes already in flight.
//!
//! # Example
//!
//! ```rust
//! use shop_verify::auth::oauth::hmac::{compute_signature, constant_time_compare};
//!
//! let sig = compute_signature("code=abc&shop=example.myshopify.com&state=xyz", "secret");
//! assert_eq!(sig.len(), 64);
//! assert!(constant_time_compare(&sig, &sig.clone()));
//! ```

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::auth::oauth::CallbackQuery;
use crate::config::FunctionsConfig;

type HmacSha256 = Hmac<Sha256>;

/// Computes a lowercase hex HMAC-SHA256 of `message` keyed by `secret`.
#[must_use]
#[allow(clippy::missing_panics_doc)] // HMAC accepts any key size, so this never panics
pub fn compute_signature(message: &str, secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Compares two strings in constant time with respect to their contents.
#[must_use]
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Result of checking a callback signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HmacCheck {
    /// Signature matched the current or the previous secret.
    Valid,
    /// Signature matched neither secret. Carries the digest computed with the
    /// current secret, for logging.
    Invalid {
        /// Digest computed with the current secret.
        computed: String,
    },
}

impl HmacCheck {
    /// Returns `true` for [`HmacCheck::Valid`].
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Validates the `hmac` parameter of an OAuth callback.
///
/// Tries the primary client secret first and then the old one if configured.
#[must_use]
pub fn validate_hmac(query: &CallbackQuery, config: &FunctionsConfig) -> HmacCheck {
    let signable = query.to_signable_string();
    let received = query.hmac().unwrap_or_default();

    let computed = compute_signature(&signable, config.api_secret_key().as_ref());
    if constant_time_compare(&computed, received) {
        return HmacCheck::Valid;
    }

    if let Some(old_secret) = config.old_api_secret_key() {
        let computed_old = compute_signature(&signable, old_secret.as_ref());
        if constant_time_compare(&computed_old, received) {
            return HmacCheck::Valid;
        }
    }

    HmacCheck::Invalid { computed }
}
