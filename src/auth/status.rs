//! Account verification status, used by the frontend to pick a route.

use serde::Serialize;

use crate::auth::AccountId;
use crate::store::{AccountStore, StoreError};

/// Whether an account has a verified shop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatus {
    /// The account has at least one verified shop.
    pub verified: bool,
    /// Same as `verified`.
    pub has_shop: bool,
    /// The account's current shop, when verified.
    pub shop: Option<String>,
    /// The account id.
    pub user_id: AccountId,
}

/// Looks up the verification status of `account`.
///
/// # Errors
///
/// Returns [`StoreError`] if the store fails.
pub async fn account_status<A>(
    accounts: &A,
    account: &AccountId,
) -> Result<AccountStatus, StoreError>
where
    A: AccountStore + ?Sized,
{
    let verified_binding = accounts
        .list_bindings(account)
        .await?
        .into_iter()
        .find(|b| b.verified);
    let verified = verified_binding.is_some();

    let shop = if verified {
        accounts
            .get_account(account)
            .await?
            .and_then(|record| record.shop)
            .or_else(|| verified_binding.map(|b| b.shop))
    } else {
        None
    };

    Ok(AccountStatus {
        verified,
        has_shop: verified,
        shop,
        user_id: account.clone(),
    })
}
