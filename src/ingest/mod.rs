//! Idempotent checkout event ingestion.
//!
//! Storefront instrumentation reports completed checkouts. Each event is
//! keyed by `(shop key, transaction id)`; a repeated report is acknowledged
//! as a duplicate and never overwrites the stored event or bumps the shop's
//! counter a second time.
//!
//! # Payload
//!
//! ```json
//! {
//!   "kons_ref": "affiliate-code",
//!   "timestamp": "2025-11-03T15:07:25.103Z",
//!   "page": "https://shop.ikas.shop/checkout?step=success",
//!   "ecommerce": {
//!     "transaction_id": "1011",
//!     "affiliation": "dev-konsiyer.ikas.shop",
//!     "value": "18",
//!     "currency": "TRY",
//!     "items": [],
//!     "customer": { "email": "a@b.c", "id": "42" }
//!   }
//! }
//! ```

mod shop_key;
mod stats;

pub use shop_key::ShopKey;
pub use stats::{fetch_shop_stats, ShopStats, StatsError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::store::{CheckoutEvent, CheckoutEventStore, RecordCheckout, StoreError};

/// Event type of every event this module stores.
pub const CHECKOUT_COMPLETED: &str = "checkout_completed";

/// Reasons a checkout report is rejected.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The body is not a JSON object.
    #[error("Invalid JSON payload")]
    InvalidJson,

    /// `ecommerce` is missing or not an object.
    #[error("Missing or invalid ecommerce data")]
    MissingEcommerce,

    /// `ecommerce.affiliation` is missing or empty.
    #[error("Missing shop affiliation")]
    MissingAffiliation,

    /// The affiliation has no usable characters.
    #[error("Invalid shop affiliation")]
    InvalidAffiliation,

    /// `ecommerce.transaction_id` is missing or empty.
    #[error("Missing transaction_id")]
    MissingTransactionId,

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a successful report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TrackOutcome {
    /// The event was new and has been stored.
    Accepted {
        /// Always `true`.
        success: bool,
        /// Human readable status.
        message: &'static str,
        /// Transaction id of the event.
        transaction_id: String,
        /// Raw affiliation.
        shop: String,
        /// Affiliate reference.
        kons_ref: Option<String>,
        /// Identifier of the stored event.
        event_id: String,
    },
    /// The event had been stored before.
    Duplicate {
        /// Always `true`.
        success: bool,
        /// Human readable status.
        message: &'static str,
        /// Transaction id of the event.
        transaction_id: String,
        /// Raw affiliation.
        shop: String,
        /// Always `true`.
        duplicate: bool,
    },
}

/// Validates a raw report body and records it.
///
/// The body is parsed as JSON whatever its declared content type, since
/// beacon senders post `text/plain`.
///
/// # Errors
///
/// Returns an [`IngestError`] validation variant for malformed input and
/// [`IngestError::Store`] if the store fails.
pub async fn track_checkout<S>(
    store: &S,
    body: &[u8],
    now: DateTime<Utc>,
) -> Result<TrackOutcome, IngestError>
where
    S: CheckoutEventStore + ?Sized,
{
    let event = parse_checkout(body, now)?;
    let transaction_id = event.transaction_id.clone();
    let shop = event.affiliation.clone();
    let shop_key = event.shop_key.clone();
    let kons_ref = event.kons_ref.clone();

    match store.record_checkout(event).await? {
        RecordCheckout::Accepted { summary } => {
            tracing::info!(
                shop_key = %shop_key,
                transaction_id = %transaction_id,
                kons_ref = ?kons_ref,
                total_events = summary.total_events,
                "Checkout event tracked"
            );
            Ok(TrackOutcome::Accepted {
                success: true,
                message: "Checkout event tracked successfully",
                event_id: transaction_id.clone(),
                transaction_id,
                shop,
                kons_ref,
            })
        }
        RecordCheckout::Duplicate => {
            tracing::info!(
                shop_key = %shop_key,
                transaction_id = %transaction_id,
                "Transaction already recorded"
            );
            Ok(TrackOutcome::Duplicate {
                success: true,
                message: "Transaction already recorded",
                transaction_id,
                shop,
                duplicate: true,
            })
        }
    }
}

/// Parses and validates a report into the event that would be stored.
///
/// # Errors
///
/// Returns the first validation failure.
pub fn parse_checkout(body: &[u8], now: DateTime<Utc>) -> Result<CheckoutEvent, IngestError> {
    let Value::Object(body) =
        serde_json::from_slice::<Value>(body).map_err(|_| IngestError::InvalidJson)?
    else {
        return Err(IngestError::InvalidJson);
    };

    let ecommerce = match body.get("ecommerce") {
        Some(Value::Object(map)) if !map.is_empty() => map,
        _ => return Err(IngestError::MissingEcommerce),
    };

    let affiliation = non_empty_string(ecommerce.get("affiliation"))
        .ok_or(IngestError::MissingAffiliation)?;
    let shop_key = ShopKey::normalize(&affiliation).ok_or(IngestError::InvalidAffiliation)?;
    let transaction_id = parse_transaction_id(ecommerce.get("transaction_id"))
        .ok_or(IngestError::MissingTransactionId)?;

    let customer = ecommerce.get("customer").and_then(Value::as_object);

    Ok(CheckoutEvent {
        shop_key,
        transaction_id,
        affiliation,
        kons_ref: non_empty_string(body.get("kons_ref")),
        timestamp: present(body.get("timestamp")),
        page: non_empty_string(body.get("page")),
        value: present(ecommerce.get("value")),
        currency: non_empty_string(ecommerce.get("currency")),
        items_count: ecommerce
            .get("items")
            .and_then(Value::as_array)
            .map_or(0, Vec::len),
        customer_email: non_empty_string(customer.and_then(|c| c.get("email"))),
        customer_id: present(customer.and_then(|c| c.get("id"))),
        ecommerce: Value::Object(ecommerce.clone()),
        received_at: now,
        event_type: CHECKOUT_COMPLETED.to_string(),
    })
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

fn present(value: Option<&Value>) -> Option<Value> {
    value.filter(|v| !v.is_null()).cloned()
}

/// Accepts a non-blank string or a number, which storefronts send
/// interchangeably. Strings are kept verbatim since they are the dedup key.
fn parse_transaction_id(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
