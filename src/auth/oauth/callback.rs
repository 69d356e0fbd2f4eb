//! Handling Shopify's redirect back after the merchant approves the app.
//!
//! The callback proves control of the shop: only Shopify can produce a valid
//! `hmac` over the callback parameters. On success the matching state is
//! marked verified and the browser is sent to the dashboard. The
//! authorization code is never exchanged for an access token.

use chrono::{DateTime, Utc};

use crate::auth::oauth::hmac::{validate_hmac, HmacCheck};
use crate::auth::oauth::{CallbackQuery, OAuthError, StateId};
use crate::config::{FunctionsConfig, ShopDomain};
use crate::store::{MarkVerified, VerificationStore};

/// Path the browser lands on after a successful callback.
pub const DASHBOARD_PATH: &str = "/dashboard";

/// Verifies a callback and returns the `Location` to redirect to.
///
/// Checks run in order: required parameters, shop grammar, signature. Any
/// failure leaves stored state untouched.
///
/// # Errors
///
/// - [`OAuthError::MissingCallbackParams`] if `shop`, `hmac` or `state` is missing
/// - [`OAuthError::InvalidShopDomain`] if the shop is malformed
/// - [`OAuthError::InvalidHmac`] if the signature does not verify
/// - [`OAuthError::ShopMismatch`] if the state was issued for another shop
/// - [`OAuthError::Store`] if the store fails
pub async fn handle_callback<S>(
    config: &FunctionsConfig,
    store: &S,
    query: &CallbackQuery,
    now: DateTime<Utc>,
) -> Result<String, OAuthError>
where
    S: VerificationStore + ?Sized,
{
    let (Some(raw_shop), Some(provided), Some(raw_state)) =
        (query.shop(), query.hmac(), query.state())
    else {
        return Err(OAuthError::MissingCallbackParams);
    };

    let shop = ShopDomain::new(raw_shop).map_err(|_| OAuthError::InvalidShopDomain)?;
    let state_id = StateId::from_raw(raw_state).ok_or(OAuthError::MissingCallbackParams)?;

    if let HmacCheck::Invalid { computed } = validate_hmac(query, config) {
        tracing::warn!(
            shop = %shop,
            calculated = %computed,
            provided = %provided,
            "HMAC verification failed"
        );
        return Err(OAuthError::InvalidHmac);
    }

    let return_url = match store.mark_verified(&state_id, &shop, now).await? {
        MarkVerified::Updated(state) => {
            tracing::info!(shop = %shop, "Shop verified");
            state.return_url
        }
        MarkVerified::Created(_) => {
            tracing::warn!(shop = %shop, "State did not exist, created verified state");
            None
        }
        MarkVerified::ShopMismatch { expected } => {
            tracing::warn!(
                shop = %shop,
                expected = ?expected,
                "Callback shop does not match state"
            );
            return Err(OAuthError::ShopMismatch);
        }
    };

    let location = redirect_location(config, return_url.as_deref(), &shop, &state_id);
    tracing::info!(location = %location, "Redirecting after verification");
    Ok(location)
}

/// Builds the post-verification redirect.
///
/// `{return origin}/dashboard?shop=..&state=..` when the state carries a
/// trusted return URL, else the same path under the frontend URL, else the
/// bare relative path.
#[must_use]
pub fn redirect_location(
    config: &FunctionsConfig,
    return_url: Option<&str>,
    shop: &ShopDomain,
    state_id: &StateId,
) -> String {
    let path = format!(
        "{DASHBOARD_PATH}?shop={}&state={}",
        form_encode(shop.as_ref()),
        form_encode(state_id.as_ref())
    );

    if let Some(url) = return_url.and_then(|raw| config.trusted_return_hosts().validate(raw)) {
        return format!("{}{path}", url.origin());
    }
    if let Some(frontend) = config.frontend_url() {
        return format!("{}{path}", frontend.without_trailing_slash());
    }
    path
}

fn form_encode(value: &str) -> String {
    urlencoding::encode(value).replace("%20", "+")
}
