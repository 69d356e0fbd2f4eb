//! Checkout statistics for an account's own shop.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use super::{ShopKey, CHECKOUT_COMPLETED};
use crate::auth::AccountId;
use crate::store::{AccountStore, CheckoutEvent, CheckoutEventStore, Platform, StoreError};

const SHOPIFY_SUFFIX: &str = ".myshopify.com";
const IKAS_SUFFIXES: [&str; 2] = [".ikas.shop", ".myikas.com"];

/// Reasons statistics cannot be returned.
#[derive(Debug, Error)]
pub enum StatsError {
    /// The account has no record.
    #[error("User not found")]
    AccountNotFound,

    /// The account has no verified shop at all.
    #[error("No verified shop found for user")]
    NoVerifiedShop,

    /// The account record is not marked verified.
    #[error("Shop not verified for user")]
    NotVerified,

    /// The bound shop does not yield a usable key.
    #[error("Invalid shop name")]
    InvalidShopName,

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Checkout statistics for one shop.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ShopStats {
    /// Shop name without the platform domain.
    pub shop_name: String,
    /// Shop name with the Shopify domain.
    pub shop_full_name: String,
    /// Key the shop's events are filed under.
    pub shop_key: ShopKey,
    /// Number of checkout events.
    pub total_checkout_events: usize,
    /// Checkout events, newest first.
    pub events: Vec<CheckoutEvent>,
}

/// Returns checkout statistics for the shop bound to `account`.
///
/// The shop comes from the account record, or the first verified binding if
/// the record names none. Only the account's own shop is ever read.
///
/// # Errors
///
/// See [`StatsError`].
pub async fn fetch_shop_stats<A, E>(
    accounts: &A,
    events: &E,
    account: &AccountId,
) -> Result<ShopStats, StatsError>
where
    A: AccountStore + ?Sized,
    E: CheckoutEventStore + ?Sized,
{
    let record = accounts
        .get_account(account)
        .await?
        .ok_or(StatsError::AccountNotFound)?;

    let (shop, platform) = match record.shop.clone().filter(|s| !s.is_empty()) {
        Some(shop) => (shop, record.platform),
        None => accounts
            .list_bindings(account)
            .await?
            .into_iter()
            .find(|b| b.verified)
            .map(|b| (b.shop, Some(b.platform)))
            .ok_or(StatsError::NoVerifiedShop)?,
    };

    if !record.verified {
        return Err(StatsError::NotVerified);
    }

    let shop_name = shop.strip_suffix(SHOPIFY_SUFFIX).unwrap_or(&shop).to_string();
    let keys = candidate_keys(&shop, &shop_name, platform);
    let shop_key = keys.first().cloned().ok_or(StatsError::InvalidShopName)?;

    let mut seen = HashSet::new();
    let mut checkout_events = Vec::new();
    for key in &keys {
        for event in events.list_events(key, CHECKOUT_COMPLETED).await? {
            if seen.insert(event.transaction_id.clone()) {
                checkout_events.push(event);
            }
        }
    }
    checkout_events.sort_by_cached_key(|e| std::cmp::Reverse(sort_key(e)));

    tracing::debug!(
        account = %account,
        shop_key = %shop_key,
        keys = keys.len(),
        count = checkout_events.len(),
        "Fetched shop stats"
    );

    Ok(ShopStats {
        shop_full_name: format!("{shop_name}{SHOPIFY_SUFFIX}"),
        shop_name,
        shop_key,
        total_checkout_events: checkout_events.len(),
        events: checkout_events,
    })
}

/// Keys a storefront may have filed the shop's events under.
///
/// Storefronts report the affiliation as either the bare shop name or a full
/// platform domain, and ingestion normalizes whatever arrives. The bound shop
/// as stored comes first.
fn candidate_keys(shop: &str, shop_name: &str, platform: Option<Platform>) -> Vec<ShopKey> {
    let mut forms = vec![
        shop.to_string(),
        shop_name.to_string(),
        format!("{shop_name}{SHOPIFY_SUFFIX}"),
    ];
    if platform == Some(Platform::Ikas) {
        forms.extend(IKAS_SUFFIXES.iter().map(|suffix| format!("{shop_name}{suffix}")));
    }

    let mut keys: Vec<ShopKey> = Vec::with_capacity(forms.len());
    for key in forms.iter().filter_map(|form| ShopKey::normalize(form)) {
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

/// Client timestamp when present, otherwise the receive time.
fn sort_key(event: &CheckoutEvent) -> String {
    match &event.timestamp {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => event.received_at.to_rfc3339(),
    }
}
