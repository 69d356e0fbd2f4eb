//! Shop ownership verification over Shopify OAuth.
//!
//! The handshake has three steps, each an independent request:
//!
//! 1. [`initiate`]: validate the shop, record a pending state, return the
//!    authorize URL
//! 2. [`handle_callback`]: verify Shopify's HMAC, mark the state verified,
//!    redirect the browser to the dashboard
//! 3. [`finalize`]: authenticate the caller, consume the verified state,
//!    bind the shop to the caller's account
//!
//! ```text
//!         initiate
//!   (none) -------> UNVERIFIED --callback--> VERIFIED --finalize--> CONSUMED
//! ```

mod callback;
mod callback_query;
mod error;
mod finalize;
pub mod hmac;
mod initiate;
mod state;

pub use callback::{handle_callback, redirect_location, DASHBOARD_PATH};
pub use callback_query::CallbackQuery;
pub use error::OAuthError;
pub use finalize::{finalize, FinalizeRequest, Finalized};
pub use hmac::{validate_hmac, HmacCheck};
pub use initiate::{authorize_url, initiate, InitiateOutcome, InitiateRequest};
pub use state::StateId;
