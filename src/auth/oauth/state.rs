//! Verification state identifiers.
//!
//! A [`StateId`] is the OAuth `state` parameter and the lookup key of a
//! [`VerificationState`](crate::store::VerificationState). It is generated
//! from 24 bytes of OS randomness and encoded as unpadded URL-safe base64,
//! giving a 32 character token with 192 bits of entropy.
//!
//! # Example
//!
//! ```rust
//! use shop_verify::auth::oauth::StateId;
//!
//! let id = StateId::generate();
//! assert_eq!(id.as_ref().len(), 32);
//! assert_ne!(id, StateId::generate());
//! ```

use base64::prelude::*;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque anti-forgery token for one verification handshake.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(String);

// Verify StateId is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<StateId>();
};

impl StateId {
    /// Number of random bytes behind each generated id.
    const ENTROPY_BYTES: usize = 24;

    /// Generates a fresh id from the operating system's CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; Self::ENTROPY_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(BASE64_URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Wraps a caller-supplied id for lookup.
    ///
    /// No format check is applied: an unknown id simply finds no state. The
    /// value is kept verbatim. Returns `None` for empty or whitespace-only
    /// input.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return None;
        }
        Some(Self(raw))
    }
}

impl AsRef<str> for StateId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
