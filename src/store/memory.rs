//! In-process store backing all three storage ports.
//!
//! A single `RwLock` guards every collection, so each trait method runs as
//! one critical section and is atomic with respect to concurrent requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::{
    AccountRecord, AccountStore, AccountUpdate, CheckoutEvent, CheckoutEventStore,
    ConsumeVerified, MarkVerified, RecordCheckout, ShopBinding, ShopEventSummary, StoreError,
    VerificationState, VerificationStore,
};
use crate::auth::oauth::StateId;
use crate::auth::AccountId;
use crate::config::ShopDomain;
use crate::ingest::ShopKey;

#[derive(Debug, Default)]
struct Collections {
    states: HashMap<StateId, VerificationState>,
    accounts: HashMap<AccountId, AccountRecord>,
    bindings: HashMap<AccountId, BTreeMap<String, ShopBinding>>,
    events: HashMap<ShopKey, BTreeMap<String, CheckoutEvent>>,
    summaries: HashMap<ShopKey, ShopEventSummary>,
}

/// Store that keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of verification states currently stored.
    pub async fn state_count(&self) -> usize {
        self.inner.read().await.states.len()
    }
}

#[async_trait]
impl VerificationStore for MemoryStore {
    async fn find_verified_for_shop(
        &self,
        shop: &ShopDomain,
    ) -> Result<Option<VerificationState>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .states
            .values()
            .find(|s| s.verified && s.shop.as_ref() == Some(shop))
            .cloned())
    }

    async fn begin(&self, state: VerificationState) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner
            .states
            .retain(|_, existing| existing.verified || existing.shop != state.shop);
        inner.states.insert(state.state_id.clone(), state);
        Ok(())
    }

    async fn get_state(&self, id: &StateId) -> Result<Option<VerificationState>, StoreError> {
        Ok(self.inner.read().await.states.get(id).cloned())
    }

    async fn mark_verified(
        &self,
        id: &StateId,
        shop: &ShopDomain,
        at: DateTime<Utc>,
    ) -> Result<MarkVerified, StoreError> {
        let mut inner = self.inner.write().await;

        if let Some(existing) = inner.states.get_mut(id) {
            if existing.shop.as_ref() != Some(shop) {
                return Ok(MarkVerified::ShopMismatch {
                    expected: existing.shop.clone(),
                });
            }
            existing.verified = true;
            existing.verified_at = Some(at);
            return Ok(MarkVerified::Updated(existing.clone()));
        }

        let created = VerificationState {
            state_id: id.clone(),
            shop: Some(shop.clone()),
            verified: true,
            created_at: at,
            verified_at: Some(at),
            return_url: None,
        };
        inner.states.insert(id.clone(), created.clone());
        Ok(MarkVerified::Created(created))
    }

    async fn consume_verified(&self, id: &StateId) -> Result<ConsumeVerified, StoreError> {
        let mut inner = self.inner.write().await;

        let Some(existing) = inner.states.get(id) else {
            return Ok(ConsumeVerified::NotFound);
        };
        if !existing.verified {
            return Ok(ConsumeVerified::NotVerified);
        }
        let Some(shop) = existing.shop.clone() else {
            return Ok(ConsumeVerified::MissingShop);
        };

        match inner.states.remove(id) {
            Some(state) => Ok(ConsumeVerified::Consumed { shop, state }),
            None => Ok(ConsumeVerified::NotFound),
        }
    }

    async fn restore(&self, state: VerificationState) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.states.entry(state.state_id.clone()).or_insert(state);
        Ok(())
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn put_binding(
        &self,
        account: &AccountId,
        binding: ShopBinding,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner
            .bindings
            .entry(account.clone())
            .or_default()
            .insert(binding.shop.clone(), binding);
        Ok(())
    }

    async fn list_bindings(&self, account: &AccountId) -> Result<Vec<ShopBinding>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .bindings
            .get(account)
            .map(|shops| shops.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn merge_account(
        &self,
        account: &AccountId,
        update: AccountUpdate,
    ) -> Result<AccountRecord, StoreError> {
        let mut inner = self.inner.write().await;
        let record = inner
            .accounts
            .entry(account.clone())
            .or_insert_with(|| AccountRecord {
                account_id: account.clone(),
                shop: None,
                platform: None,
                verified: false,
                last_updated: update.at,
            });
        record.shop = Some(update.shop);
        record.platform = Some(update.platform);
        record.verified = update.verified;
        record.last_updated = update.at;
        Ok(record.clone())
    }

    async fn get_account(&self, account: &AccountId) -> Result<Option<AccountRecord>, StoreError> {
        Ok(self.inner.read().await.accounts.get(account).cloned())
    }
}

#[async_trait]
impl CheckoutEventStore for MemoryStore {
    async fn record_checkout(&self, event: CheckoutEvent) -> Result<RecordCheckout, StoreError> {
        let mut inner = self.inner.write().await;

        let shop_events = inner.events.entry(event.shop_key.clone()).or_default();
        if shop_events.contains_key(&event.transaction_id) {
            return Ok(RecordCheckout::Duplicate);
        }

        let shop_key = event.shop_key.clone();
        let shop_name = event.affiliation.clone();
        let received_at = event.received_at;
        shop_events.insert(event.transaction_id.clone(), event);

        let summary = inner
            .summaries
            .entry(shop_key.clone())
            .or_insert_with(|| ShopEventSummary {
                shop_key,
                shop_name: shop_name.clone(),
                total_events: 0,
                last_event_at: received_at,
            });
        summary.total_events += 1;
        summary.shop_name = shop_name;
        summary.last_event_at = received_at;

        Ok(RecordCheckout::Accepted {
            summary: summary.clone(),
        })
    }

    async fn get_summary(
        &self,
        shop_key: &ShopKey,
    ) -> Result<Option<ShopEventSummary>, StoreError> {
        Ok(self.inner.read().await.summaries.get(shop_key).cloned())
    }

    async fn list_events(
        &self,
        shop_key: &ShopKey,
        event_type: &str,
    ) -> Result<Vec<CheckoutEvent>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .events
            .get(shop_key)
            .map(|events| {
                events
                    .values()
                    .filter(|e| e.event_type == event_type)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

// Verify MemoryStore is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<MemoryStore>();
};
