//! Storage ports and persisted records.
//!
//! Handlers talk to storage only through the traits in this module. Every
//! trait method is a single atomic operation against the backing store, which
//! is what makes the handshake and ingestion races safe:
//!
//! - [`VerificationStore::begin`] replaces pending states for a shop
//! - [`VerificationStore::mark_verified`] checks the shop and flips the flag
//! - [`VerificationStore::consume_verified`] reads and deletes in one step
//! - [`CheckoutEventStore::record_checkout`] creates the event and bumps the
//!   shop summary together
//!
//! [`MemoryStore`] implements all three ports.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::auth::oauth::StateId;
use crate::auth::AccountId;
use crate::config::ShopDomain;
use crate::ingest::ShopKey;

/// Errors raised by storage adapters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be reached.
    #[error("store unavailable: {message}")]
    Unavailable {
        /// Backend error description.
        message: String,
    },

    /// A read or write failed.
    #[error("store operation failed: {message}")]
    Operation {
        /// Backend error description.
        message: String,
    },
}

/// Commerce platform a shop belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Shopify, verified through the OAuth handshake.
    Shopify,
    /// Ikas, connected with client credentials.
    Ikas,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shopify => f.write_str("shopify"),
            Self::Ikas => f.write_str("ikas"),
        }
    }
}

/// One in-flight or completed verification handshake.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationState {
    /// Lookup key and OAuth `state` parameter.
    pub state_id: StateId,
    /// Shop being verified. Only a damaged record lacks it.
    pub shop: Option<ShopDomain>,
    /// Set once the callback signature checked out.
    pub verified: bool,
    /// When the handshake started.
    pub created_at: DateTime<Utc>,
    /// When the callback verified the shop.
    pub verified_at: Option<DateTime<Utc>>,
    /// Trusted URL the browser returns to after the callback.
    pub return_url: Option<String>,
}

impl VerificationState {
    /// A fresh, unverified state.
    #[must_use]
    pub fn pending(
        state_id: StateId,
        shop: ShopDomain,
        return_url: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            state_id,
            shop: Some(shop),
            verified: false,
            created_at: now,
            verified_at: None,
            return_url,
        }
    }
}

/// Outcome of [`VerificationStore::mark_verified`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MarkVerified {
    /// An existing state was marked verified.
    Updated(VerificationState),
    /// No state existed; a verified one was created.
    Created(VerificationState),
    /// The existing state belongs to another shop and was left untouched.
    ShopMismatch {
        /// Shop recorded on the state.
        expected: Option<ShopDomain>,
    },
}

/// Outcome of [`VerificationStore::consume_verified`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsumeVerified {
    /// No state with that id exists (never created or already consumed).
    NotFound,
    /// The state exists but the callback has not verified it. It is kept.
    NotVerified,
    /// The state is verified but has no shop. It is kept.
    MissingShop,
    /// The state was verified and has been deleted.
    Consumed {
        /// Shop the handshake verified.
        shop: ShopDomain,
        /// The deleted state.
        state: VerificationState,
    },
}

/// Persistence for verification handshakes.
#[async_trait]
pub trait VerificationStore: Send + Sync {
    /// Returns a verified, unconsumed state for `shop`, if any.
    async fn find_verified_for_shop(
        &self,
        shop: &ShopDomain,
    ) -> Result<Option<VerificationState>, StoreError>;

    /// Stores a new pending state, deleting any other pending state for the
    /// same shop in the same operation.
    async fn begin(&self, state: VerificationState) -> Result<(), StoreError>;

    /// Reads a state.
    async fn get_state(&self, id: &StateId) -> Result<Option<VerificationState>, StoreError>;

    /// Marks `id` verified for `shop`, creating it verified if absent.
    async fn mark_verified(
        &self,
        id: &StateId,
        shop: &ShopDomain,
        at: DateTime<Utc>,
    ) -> Result<MarkVerified, StoreError>;

    /// Deletes and returns `id` if and only if it is verified and has a shop.
    async fn consume_verified(&self, id: &StateId) -> Result<ConsumeVerified, StoreError>;

    /// Puts back a state returned by [`consume_verified`](Self::consume_verified).
    /// Does nothing if a state with the same id exists again.
    async fn restore(&self, state: VerificationState) -> Result<(), StoreError>;
}

/// Credentials obtained when connecting a client-credentials platform.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformCredentials {
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Access token issued by the platform.
    pub access_token: String,
}

impl fmt::Debug for PlatformCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"*****")
            .field("access_token", &"*****")
            .finish()
    }
}

/// A shop bound to an account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopBinding {
    /// Shop identifier: the shop domain for Shopify, the store name for Ikas.
    pub shop: String,
    /// Platform the shop belongs to.
    pub platform: Platform,
    /// Whether ownership was proven.
    pub verified: bool,
    /// When ownership was proven.
    pub verified_at: DateTime<Utc>,
    /// Platform credentials, for client-credentials connections.
    pub credentials: Option<PlatformCredentials>,
}

/// Top-level account summary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    /// Account the record belongs to.
    pub account_id: AccountId,
    /// Most recently bound shop.
    pub shop: Option<String>,
    /// Platform of that shop.
    pub platform: Option<Platform>,
    /// Whether the account has a verified shop.
    pub verified: bool,
    /// Last modification time.
    pub last_updated: DateTime<Utc>,
}

/// Fields merged into an [`AccountRecord`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountUpdate {
    /// Shop to record.
    pub shop: String,
    /// Platform of that shop.
    pub platform: Platform,
    /// Verification flag to record.
    pub verified: bool,
    /// Modification time.
    pub at: DateTime<Utc>,
}

/// Persistence for accounts and their shop bindings.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Creates or overwrites the binding keyed by `(account, binding.shop)`.
    async fn put_binding(&self, account: &AccountId, binding: ShopBinding)
        -> Result<(), StoreError>;

    /// Lists an account's bindings ordered by shop.
    async fn list_bindings(&self, account: &AccountId) -> Result<Vec<ShopBinding>, StoreError>;

    /// Creates the account record or merges `update` into it.
    async fn merge_account(
        &self,
        account: &AccountId,
        update: AccountUpdate,
    ) -> Result<AccountRecord, StoreError>;

    /// Reads an account record.
    async fn get_account(&self, account: &AccountId) -> Result<Option<AccountRecord>, StoreError>;
}

/// A checkout completion reported by storefront instrumentation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckoutEvent {
    /// Normalized shop key the event is filed under.
    pub shop_key: ShopKey,
    /// Caller-supplied idempotency key.
    pub transaction_id: String,
    /// Raw affiliation as sent by the client.
    pub affiliation: String,
    /// Affiliate reference, if the visitor arrived through one.
    pub kons_ref: Option<String>,
    /// Client-side timestamp, passed through as sent.
    pub timestamp: Option<serde_json::Value>,
    /// Page the event was sent from.
    pub page: Option<String>,
    /// Full e-commerce payload as sent.
    pub ecommerce: serde_json::Value,
    /// Order value, passed through as sent.
    pub value: Option<serde_json::Value>,
    /// Currency code.
    pub currency: Option<String>,
    /// Number of line items.
    pub items_count: usize,
    /// Customer email, if provided.
    pub customer_email: Option<String>,
    /// Customer id, passed through as sent.
    pub customer_id: Option<serde_json::Value>,
    /// Server receive time.
    pub received_at: DateTime<Utc>,
    /// Always `checkout_completed`.
    pub event_type: String,
}

/// Per-shop event counter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopEventSummary {
    /// Shop key the summary belongs to.
    pub shop_key: ShopKey,
    /// Raw affiliation of the latest accepted event.
    pub shop_name: String,
    /// Number of distinct events accepted.
    pub total_events: u64,
    /// Receive time of the latest accepted event.
    pub last_event_at: DateTime<Utc>,
}

/// Outcome of [`CheckoutEventStore::record_checkout`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordCheckout {
    /// The event was new; it was stored and the summary incremented.
    Accepted {
        /// Summary after the increment.
        summary: ShopEventSummary,
    },
    /// An event with the same key already existed. Nothing was written.
    Duplicate,
}

/// Persistence for checkout events.
#[async_trait]
pub trait CheckoutEventStore: Send + Sync {
    /// Creates the event keyed by `(shop_key, transaction_id)` if absent and,
    /// in the same operation, increments the shop summary.
    async fn record_checkout(&self, event: CheckoutEvent) -> Result<RecordCheckout, StoreError>;

    /// Reads a shop summary.
    async fn get_summary(&self, shop_key: &ShopKey)
        -> Result<Option<ShopEventSummary>, StoreError>;

    /// Lists a shop's events of the given type.
    async fn list_events(
        &self,
        shop_key: &ShopKey,
        event_type: &str,
    ) -> Result<Vec<CheckoutEvent>, StoreError>;
}
