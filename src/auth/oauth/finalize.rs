//! Binding a verified shop to an authenticated account.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::auth::oauth::{OAuthError, StateId};
use crate::auth::{AccountId, CredentialError, CredentialVerifier};
use crate::config::ShopDomain;
use crate::store::{
    AccountStore, AccountUpdate, ConsumeVerified, Platform, ShopBinding, StoreError,
    VerificationStore,
};

/// Finalize request body.
///
/// The credential may be sent as `credential`, `idToken` or `id_token`; the
/// state as `state` or `state_id`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct FinalizeRequest {
    /// Bearer credential.
    #[serde(default)]
    pub credential: Option<String>,
    /// Alias of `credential`.
    #[serde(default, rename = "idToken")]
    pub id_token_camel: Option<String>,
    /// Alias of `credential`.
    #[serde(default)]
    pub id_token: Option<String>,
    /// State id from the callback redirect.
    #[serde(default)]
    pub state: Option<String>,
    /// Alias of `state`.
    #[serde(default)]
    pub state_id: Option<String>,
}

impl FinalizeRequest {
    /// The first non-blank credential field.
    #[must_use]
    pub fn credential(&self) -> Option<&str> {
        [&self.credential, &self.id_token_camel, &self.id_token]
            .into_iter()
            .filter_map(Option::as_deref)
            .find(|s| !s.trim().is_empty())
    }

    fn state_id(&self) -> Option<StateId> {
        [&self.state, &self.state_id]
            .into_iter()
            .filter_map(|s| s.clone())
            .find_map(StateId::from_raw)
    }
}

/// Binding created by a successful Finalize.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Finalized {
    /// Account the shop was bound to.
    pub account: AccountId,
    /// The bound shop.
    pub shop: ShopDomain,
}

/// Consumes a verified state and binds its shop to the caller's account.
///
/// The state is consumed in one atomic store operation before anything is
/// written, so two concurrent calls with the same state bind at most once.
/// If the binding cannot be written the state is restored, so the caller can
/// retry. An unverified state is left in place for a later attempt.
///
/// # Errors
///
/// - [`OAuthError::Credential`] if the credential is missing or invalid
/// - [`OAuthError::MissingState`] if no state id was sent
/// - [`OAuthError::InvalidOrExpiredState`] if the state does not exist
/// - [`OAuthError::NotVerified`] if the callback has not verified the state
/// - [`OAuthError::StateMissingShop`] if the state has no shop
/// - [`OAuthError::Store`] if the store fails
pub async fn finalize<V, S, A>(
    verifier: &V,
    states: &S,
    accounts: &A,
    request: &FinalizeRequest,
    now: DateTime<Utc>,
) -> Result<Finalized, OAuthError>
where
    V: CredentialVerifier + ?Sized,
    S: VerificationStore + ?Sized,
    A: AccountStore + ?Sized,
{
    let token = request.credential().ok_or(CredentialError::Missing)?;
    let state_id = request.state_id().ok_or(OAuthError::MissingState)?;

    let account = verifier
        .verify(token)
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "Failed to verify credential in finalize"))?;

    let (shop, consumed) = match states.consume_verified(&state_id).await? {
        ConsumeVerified::Consumed { shop, state } => (shop, state),
        ConsumeVerified::NotFound => return Err(OAuthError::InvalidOrExpiredState),
        ConsumeVerified::NotVerified => return Err(OAuthError::NotVerified),
        ConsumeVerified::MissingShop => return Err(OAuthError::StateMissingShop),
    };

    if let Err(e) = bind_shop(accounts, &account, &shop, now).await {
        tracing::error!(account = %account, shop = %shop, error = %e, "Failed to bind shop");
        if let Err(restore_err) = states.restore(consumed).await {
            tracing::error!(error = %restore_err, "Failed to restore verification state");
        }
        return Err(e.into());
    }

    tracing::info!(account = %account, shop = %shop, "Shop bound to account");
    Ok(Finalized { account, shop })
}

async fn bind_shop<A>(
    accounts: &A,
    account: &AccountId,
    shop: &ShopDomain,
    now: DateTime<Utc>,
) -> Result<(), StoreError>
where
    A: AccountStore + ?Sized,
{
    accounts
        .put_binding(
            account,
            ShopBinding {
                shop: shop.as_ref().to_string(),
                platform: Platform::Shopify,
                verified: true,
                verified_at: now,
                credentials: None,
            },
        )
        .await?;
    accounts
        .merge_account(
            account,
            AccountUpdate {
                shop: shop.as_ref().to_string(),
                platform: Platform::Shopify,
                verified: true,
                at: now,
            },
        )
        .await?;
    Ok(())
}
