//! Ikas store connection over the OAuth 2.0 client credentials grant.
//!
//! Unlike Shopify, an Ikas merchant proves ownership by supplying the
//! client id and secret of a private app created in their store. A token
//! request against the store's own token endpoint succeeds only with valid
//! credentials, so a successful exchange is treated as verification.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::{AccountId, CredentialError, CredentialVerifier};
use crate::config::FunctionsConfig;
use crate::store::{
    AccountStore, AccountUpdate, Platform, PlatformCredentials, ShopBinding, StoreError,
};

const CLIENT_CREDENTIALS_GRANT_TYPE: &str = "client_credentials";
const SHOP_PLACEHOLDER: &str = "{shop}";

/// Errors from connecting an Ikas store.
#[derive(Debug, Error)]
pub enum IkasError {
    /// `shop_name`, `client_id` or `client_secret` is blank.
    #[error("Missing required fields: shop_name, client_id, client_secret")]
    MissingFields,

    /// The store name is not a valid Ikas subdomain.
    #[error("Invalid shop name '{name}'")]
    InvalidShopName {
        /// The normalized name that was rejected.
        name: String,
    },

    /// The token endpoint could not be reached or timed out.
    #[error("Failed to connect to Ikas API: {message}")]
    Unreachable {
        /// Transport error description.
        message: String,
    },

    /// The token endpoint answered with a non-success status.
    #[error("Failed to authenticate with Ikas: {body}")]
    Rejected {
        /// HTTP status returned by Ikas.
        status: u16,
        /// Response body, or a fallback message when empty.
        body: String,
    },

    /// The token endpoint answered without an access token.
    #[error("Failed to retrieve access token from Ikas")]
    MissingAccessToken,

    /// The HTTP client could not be constructed.
    #[error("Failed to build Ikas HTTP client: {message}")]
    Client {
        /// Builder error description.
        message: String,
    },

    /// The caller's credential was rejected.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Connect request body.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct IkasConnectRequest {
    /// Store name as typed by the merchant.
    #[serde(default)]
    pub shop_name: String,
    /// Private app client id.
    #[serde(default)]
    pub client_id: String,
    /// Private app client secret.
    #[serde(default)]
    pub client_secret: String,
    /// Bearer credential.
    #[serde(default)]
    pub credential: Option<String>,
    /// Alias of `credential`.
    #[serde(default, rename = "idToken")]
    pub id_token_camel: Option<String>,
    /// Alias of `credential`.
    #[serde(default)]
    pub id_token: Option<String>,
}

impl IkasConnectRequest {
    fn credential(&self) -> Option<&str> {
        [&self.credential, &self.id_token_camel, &self.id_token]
            .into_iter()
            .filter_map(Option::as_deref)
            .find(|s| !s.trim().is_empty())
    }
}

/// Successful connect response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IkasConnected {
    /// Always `true`.
    pub success: bool,
    /// Human-readable message.
    pub message: String,
    /// Store name as sent by the caller.
    pub shop_name: String,
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// HTTP client for the Ikas admin token endpoint.
#[derive(Clone, Debug)]
pub struct IkasClient {
    http: reqwest::Client,
    token_url: String,
}

impl IkasClient {
    /// Creates a client for a token URL template containing `{shop}`.
    ///
    /// # Errors
    ///
    /// Returns [`IkasError::Client`] if the HTTP client cannot be built.
    pub fn new(token_url: impl Into<String>, timeout: Duration) -> Result<Self, IkasError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IkasError::Client {
                message: e.to_string(),
            })?;
        Ok(Self {
            http,
            token_url: token_url.into(),
        })
    }

    /// Creates a client from the configured token URL and timeout.
    ///
    /// # Errors
    ///
    /// Returns [`IkasError::Client`] if the HTTP client cannot be built.
    pub fn from_config(config: &FunctionsConfig) -> Result<Self, IkasError> {
        Self::new(config.ikas_token_url(), config.ikas_timeout())
    }

    /// Token endpoint for `shop`.
    #[must_use]
    pub fn token_url(&self, shop: &str) -> String {
        self.token_url.replace(SHOP_PLACEHOLDER, shop)
    }

    /// Requests an access token with the client credentials grant.
    ///
    /// # Errors
    ///
    /// - [`IkasError::Unreachable`] on network failure or timeout
    /// - [`IkasError::Rejected`] if Ikas answers with a non-success status
    /// - [`IkasError::MissingAccessToken`] if the answer has no token
    pub async fn request_token(
        &self,
        shop: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<String, IkasError> {
        let url = self.token_url(shop);
        tracing::info!(url = %url, "Requesting access token from Ikas");

        let response = self
            .http
            .post(&url)
            .form(&TokenRequest {
                grant_type: CLIENT_CREDENTIALS_GRANT_TYPE,
                client_id,
                client_secret,
            })
            .send()
            .await
            .map_err(|e| IkasError::Unreachable {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = if body.trim().is_empty() {
                "Failed to fetch access token from Ikas".to_string()
            } else {
                body
            };
            tracing::error!(status = status.as_u16(), body = %body, "Ikas token request rejected");
            return Err(IkasError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|_| IkasError::MissingAccessToken)?;
        token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(IkasError::MissingAccessToken)
    }
}

/// Normalizes a merchant-typed store name into an Ikas subdomain.
///
/// Lowercases, replaces spaces with `-`, and requires
/// `^[a-z0-9][a-z0-9-]*$`.
#[must_use]
pub fn normalize_shop_name(raw: &str) -> Option<String> {
    let name = raw.trim().to_lowercase().replace(' ', "-");
    let mut chars = name.chars();
    let first_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    let rest_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    (first_ok && rest_ok).then_some(name)
}

/// Verifies an Ikas store's client credentials and binds it to the caller.
///
/// # Errors
///
/// - [`IkasError::MissingFields`] if a required field is blank
/// - [`IkasError::Credential`] if the credential is missing or invalid
/// - [`IkasError::InvalidShopName`] if the store name is not a subdomain
/// - [`IkasError::Unreachable`], [`IkasError::Rejected`],
///   [`IkasError::MissingAccessToken`] from the token request
/// - [`IkasError::Store`] if the store fails
pub async fn connect_ikas<V, A>(
    client: &IkasClient,
    verifier: &V,
    accounts: &A,
    request: &IkasConnectRequest,
    now: DateTime<Utc>,
) -> Result<IkasConnected, IkasError>
where
    V: CredentialVerifier + ?Sized,
    A: AccountStore + ?Sized,
{
    let shop_name = request.shop_name.trim();
    let client_id = request.client_id.trim();
    let client_secret = request.client_secret.trim();
    if shop_name.is_empty() || client_id.is_empty() || client_secret.is_empty() {
        return Err(IkasError::MissingFields);
    }

    let token = request.credential().ok_or(CredentialError::Missing)?;
    let account: AccountId = verifier
        .verify(token)
        .await
        .inspect_err(|e| {
            tracing::warn!(error = %e, "Failed to verify credential in ikas_connect");
        })?;

    let shop = normalize_shop_name(shop_name).ok_or_else(|| IkasError::InvalidShopName {
        name: shop_name.to_lowercase(),
    })?;
    tracing::info!(shop = %shop, account = %account, "Ikas connection request");

    let access_token = client.request_token(&shop, client_id, client_secret).await?;

    accounts
        .put_binding(
            &account,
            ShopBinding {
                shop: shop.clone(),
                platform: Platform::Ikas,
                verified: true,
                verified_at: now,
                credentials: Some(PlatformCredentials {
                    client_id: client_id.to_string(),
                    client_secret: client_secret.to_string(),
                    access_token,
                }),
            },
        )
        .await?;
    accounts
        .merge_account(
            &account,
            AccountUpdate {
                shop: shop.clone(),
                platform: Platform::Ikas,
                verified: true,
                at: now,
            },
        )
        .await?;

    tracing::info!(shop = %shop, account = %account, "Ikas shop connected");
    Ok(IkasConnected {
        success: true,
        message: "Ikas shop connected successfully".to_string(),
        shop_name: shop_name.to_string(),
    })
}

// Verify types are Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<IkasClient>();
    assert_send_sync::<IkasError>();
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct EchoVerifier;

    #[async_trait]
    impl CredentialVerifier for EchoVerifier {
        async fn verify(&self, token: &str) -> Result<AccountId, CredentialError> {
            AccountId::new(token).ok_or(CredentialError::MissingSubject)
        }
    }

    fn client_for(server: &MockServer) -> IkasClient {
        IkasClient::new(
            format!("{}/{{shop}}/api/admin/oauth/token", server.uri()),
            Duration::from_secs(2),
        )
        .unwrap()
    }

    fn request(shop: &str) -> IkasConnectRequest {
        IkasConnectRequest {
            shop_name: shop.to_string(),
            client_id: "cid".to_string(),
            client_secret: "csecret".to_string(),
            credential: Some("user-1".to_string()),
            ..IkasConnectRequest::default()
        }
    }

    #[test]
    fn test_normalize_shop_name() {
        assert_eq!(normalize_shop_name("My Store").as_deref(), Some("my-store"));
        assert_eq!(normalize_shop_name("  shop1 ").as_deref(), Some("shop1"));
        assert!(normalize_shop_name("-shop").is_none());
        assert!(normalize_shop_name("shop.evil.com").is_none());
        assert!(normalize_shop_name("").is_none());
    }

    #[test]
    fn test_token_url_substitutes_shop() {
        let client =
            IkasClient::new(crate::config::DEFAULT_IKAS_TOKEN_URL, Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.token_url("my-store"),
            "https://my-store.myikas.com/api/admin/oauth/token"
        );
    }

    #[tokio::test]
    async fn test_connect_stores_binding_with_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/my-store/api/admin/oauth/token"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=cid"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "tok-123"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let store = MemoryStore::new();
        let done = connect_ikas(
            &client_for(&server),
            &EchoVerifier,
            &store,
            &request("My Store"),
            Utc::now(),
        )
        .await
        .unwrap();

        assert!(done.success);
        assert_eq!(done.shop_name, "My Store");

        let account = AccountId::new("user-1").unwrap();
        let bindings = store.list_bindings(&account).await.unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].shop, "my-store");
        assert_eq!(bindings[0].platform, Platform::Ikas);
        let creds = bindings[0].credentials.as_ref().unwrap();
        assert_eq!(creds.access_token, "tok-123");
        assert!(!format!("{creds:?}").contains("csecret"));

        let record = store.get_account(&account).await.unwrap().unwrap();
        assert_eq!(record.platform, Some(Platform::Ikas));
        assert_eq!(record.shop.as_deref(), Some("my-store"));
    }

    #[tokio::test]
    async fn test_rejected_credentials_surface_upstream_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/shop/api/admin/oauth/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
            .mount(&server)
            .await;

        let store = MemoryStore::new();
        let client = client_for(&server);
        let err = connect_ikas(&client, &EchoVerifier, &store, &request("shop"), Utc::now())
            .await
            .unwrap_err();

        match err {
            IkasError::Rejected { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "invalid_client");
            }
            other => panic!("Expected Rejected, got: {other:?}"),
        }
        let account = AccountId::new("user-1").unwrap();
        assert!(store.list_bindings(&account).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_response_without_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let err = connect_ikas(
            &client_for(&server),
            &EchoVerifier,
            &MemoryStore::new(),
            &request("shop"),
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, IkasError::MissingAccessToken));
    }

    #[tokio::test]
    async fn test_timeout_is_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let client = IkasClient::new(
            format!("{}/{{shop}}/token", server.uri()),
            Duration::from_millis(200),
        )
        .unwrap();
        let store = MemoryStore::new();
        let err = connect_ikas(&client, &EchoVerifier, &store, &request("shop"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, IkasError::Unreachable { .. }));
    }

    #[tokio::test]
    async fn test_validation_happens_before_any_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let client = client_for(&server);
        let store = MemoryStore::new();

        let mut missing = request("shop");
        missing.client_secret = "  ".to_string();
        assert!(matches!(
            connect_ikas(&client, &EchoVerifier, &store, &missing, Utc::now()).await,
            Err(IkasError::MissingFields)
        ));

        let mut anonymous = request("shop");
        anonymous.credential = None;
        assert!(matches!(
            connect_ikas(&client, &EchoVerifier, &store, &anonymous, Utc::now()).await,
            Err(IkasError::Credential(CredentialError::Missing))
        ));

        assert!(matches!(
            connect_ikas(&client, &EchoVerifier, &store, &request("bad/name"), Utc::now()).await,
            Err(IkasError::InvalidShopName { .. })
        ));
    }
}
