//! Authentication: shop ownership verification and account credentials.
//!
//! - [`oauth`]: the Initiate / Callback / Finalize handshake
//! - [`CredentialVerifier`]: verifies the bearer credential of an account
//! - [`account_status`]: whether an account has a verified shop

mod credential;
pub mod oauth;
mod status;

pub use credential::{AccountId, CredentialError, CredentialVerifier, JwtCredentialVerifier};
pub use status::{account_status, AccountStatus};
