//! Starting a shop verification handshake.
//!
//! Initiate validates the shop and the optional return URL, records a new
//! pending [`VerificationState`] and hands back the Shopify authorize URL for
//! the browser to open. A shop that already holds a verified, unconsumed
//! state is reported as verified instead and nothing is written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::oauth::{OAuthError, StateId};
use crate::config::{FunctionsConfig, ShopDomain};
use crate::store::{VerificationState, VerificationStore};

/// Parameters accepted by Initiate, from a query string or a body.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct InitiateRequest {
    /// Shop domain.
    #[serde(default)]
    pub shop: Option<String>,
    /// Alias of `shop`.
    #[serde(default)]
    pub shop_domain: Option<String>,
    /// Where to send the browser after the callback.
    #[serde(default)]
    pub return_url: Option<String>,
}

impl InitiateRequest {
    fn shop_input(&self) -> &str {
        self.shop
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or(self.shop_domain.as_deref())
            .unwrap_or_default()
    }

    fn return_url_input(&self) -> Option<&str> {
        self.return_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Successful Initiate response body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum InitiateOutcome {
    /// A new handshake was recorded.
    Redirect {
        /// Shopify authorize URL to open.
        redirect_url: String,
        /// Always `true`.
        success: bool,
    },
    /// The shop is already verified.
    AlreadyVerified {
        /// Always `true`.
        success: bool,
        /// Human readable status.
        message: &'static str,
        /// Always `true`.
        already_verified: bool,
    },
}

/// Builds the Shopify authorize URL for `shop` and `state`.
#[must_use]
pub fn authorize_url(config: &FunctionsConfig, shop: &ShopDomain, state: &StateId) -> String {
    let query = [
        ("client_id", config.api_key().as_ref()),
        ("scope", config.scopes()),
        ("redirect_uri", config.redirect_uri().as_ref()),
        ("state", state.as_ref()),
    ]
    .iter()
    .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
    .collect::<Vec<_>>()
    .join("&");

    format!("https://{}/admin/oauth/authorize?{query}", shop.as_ref())
}

/// Starts a verification handshake.
///
/// # Errors
///
/// - [`OAuthError::InvalidShopDomain`] if the shop is malformed
/// - [`OAuthError::UntrustedReturnUrl`] if a return URL is given and not trusted
/// - [`OAuthError::Store`] if the store fails
pub async fn initiate<S>(
    config: &FunctionsConfig,
    store: &S,
    request: &InitiateRequest,
    now: DateTime<Utc>,
) -> Result<InitiateOutcome, OAuthError>
where
    S: VerificationStore + ?Sized,
{
    let shop = ShopDomain::new(request.shop_input()).map_err(|_| OAuthError::InvalidShopDomain)?;

    let return_url = match request.return_url_input() {
        Some(raw) => {
            let Some(url) = config.trusted_return_hosts().validate(raw) else {
                tracing::warn!(return_url = %raw, "Rejected untrusted return URL");
                return Err(OAuthError::UntrustedReturnUrl);
            };
            Some(url.to_string())
        }
        None => None,
    };

    if store.find_verified_for_shop(&shop).await?.is_some() {
        tracing::info!(shop = %shop, "Shop already verified");
        return Ok(InitiateOutcome::AlreadyVerified {
            success: true,
            message: "This shop is already verified",
            already_verified: true,
        });
    }

    let state_id = StateId::generate();
    store
        .begin(VerificationState::pending(
            state_id.clone(),
            shop.clone(),
            return_url,
            now,
        ))
        .await?;

    tracing::info!(
        shop = %shop,
        redirect_uri = %config.redirect_uri().as_ref(),
        "Initiating shop verification"
    );

    Ok(InitiateOutcome::Redirect {
        redirect_url: authorize_url(config, &shop, &state_id),
        success: true,
    })
}
