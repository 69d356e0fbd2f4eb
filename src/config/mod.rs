//! Service configuration.
//!
//! The main types in this module are:
//!
//! - [`FunctionsConfig`]: every setting the handlers need, built once at startup
//! - [`FunctionsConfigBuilder`]: a builder for constructing [`FunctionsConfig`]
//! - [`ApiKey`], [`ApiSecretKey`], [`ShopDomain`], [`HostUrl`]: validated newtypes
//! - [`TrustedReturnHosts`], [`AllowedOrigins`]: redirect and CORS allowlists
//!
//! # Environment Variables
//!
//! [`FunctionsConfig::from_env`] loads a `.env` file if present and reads:
//!
//! ## Required
//! - `SHOPIFY_API_KEY` - OAuth client id
//! - `SHOPIFY_API_SECRET` - OAuth client secret, the callback HMAC key
//! - `SHOPIFY_REDIRECT_URI` - absolute URL of the callback function
//! - `CREDENTIAL_SECRET` - HS256 key used to verify account ID tokens
//!
//! ## Optional
//! - `SHOPIFY_OLD_API_SECRET` - previous secret, accepted during key rotation
//! - `SHOPIFY_SCOPES` - requested scopes (default: `read_products`)
//! - `FRONTEND_URL` - redirect base when a handshake has no return URL
//! - `CREDENTIAL_AUDIENCE` - required `aud` claim of ID tokens
//! - `TRUSTED_RETURN_HOST_SUFFIXES` - comma separated return host suffixes
//! - `CORS_ALLOWED_ORIGINS` - comma separated exact origins
//! - `IKAS_TOKEN_URL` - token endpoint template containing `{shop}`
//! - `IKAS_TOKEN_TIMEOUT_SECS` - token request timeout (default: 10)
//! - `FUNCTIONS_HOST` - bind address (default: 127.0.0.1)
//! - `FUNCTIONS_PORT` - listen port (default: 8080)
//!
//! # Example
//!
//! ```rust
//! use shop_verify::{ApiKey, ApiSecretKey, FunctionsConfig, HostUrl};
//!
//! let config = FunctionsConfig::builder()
//!     .api_key(ApiKey::new("client-id").unwrap())
//!     .api_secret_key(ApiSecretKey::new("client-secret").unwrap())
//!     .redirect_uri(HostUrl::new("https://fn.example.com/shopify_callback").unwrap())
//!     .credential_secret(ApiSecretKey::new("id-token-key").unwrap())
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.scopes(), "read_products");
//! ```

mod newtypes;
mod trust;

pub use newtypes::{ApiKey, ApiSecretKey, HostUrl, ShopDomain};
pub use trust::{AllowedOrigins, ReturnUrl, TrustedReturnHosts};

use crate::error::ConfigError;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default OAuth scopes requested during verification.
pub const DEFAULT_SCOPES: &str = "read_products";

/// Default Ikas token endpoint. `{shop}` is replaced by the store name.
pub const DEFAULT_IKAS_TOKEN_URL: &str = "https://{shop}.myikas.com/api/admin/oauth/token";

/// Default timeout for the Ikas token request.
pub const DEFAULT_IKAS_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration shared by every handler.
///
/// # Key Rotation
///
/// When `old_api_secret_key` is set, callback HMACs signed with the previous
/// secret are still accepted, so handshakes in flight survive a rotation.
#[derive(Clone, Debug)]
pub struct FunctionsConfig {
    api_key: ApiKey,
    api_secret_key: ApiSecretKey,
    old_api_secret_key: Option<ApiSecretKey>,
    scopes: String,
    redirect_uri: HostUrl,
    frontend_url: Option<HostUrl>,
    credential_secret: ApiSecretKey,
    credential_audience: Option<String>,
    trusted_return_hosts: TrustedReturnHosts,
    allowed_origins: AllowedOrigins,
    ikas_token_url: String,
    ikas_timeout: Duration,
    host: IpAddr,
    port: u16,
}

impl FunctionsConfig {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> FunctionsConfigBuilder {
        FunctionsConfigBuilder::new()
    }

    /// Loads configuration from the process environment, reading `.env`
    /// first when present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required variable is missing or any
    /// variable fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    ///
    /// # Errors
    ///
    /// Same as [`FunctionsConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required =
            |key: &str| optional(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()));
        let invalid = |name: &str, reason: String| ConfigError::InvalidEnvVar {
            name: name.to_string(),
            reason,
        };

        let mut builder = Self::builder()
            .api_key(ApiKey::new(required("SHOPIFY_API_KEY")?)?)
            .api_secret_key(ApiSecretKey::new(required("SHOPIFY_API_SECRET")?)?)
            .redirect_uri(HostUrl::new(required("SHOPIFY_REDIRECT_URI")?)?)
            .credential_secret(
                ApiSecretKey::new(required("CREDENTIAL_SECRET")?)
                    .map_err(|_| ConfigError::EmptyCredentialSecret)?,
            );

        if let Some(old) = optional("SHOPIFY_OLD_API_SECRET") {
            builder = builder.old_api_secret_key(ApiSecretKey::new(old)?);
        }
        if let Some(scopes) = optional("SHOPIFY_SCOPES") {
            builder = builder.scopes(scopes);
        }
        if let Some(frontend) = optional("FRONTEND_URL") {
            builder = builder.frontend_url(HostUrl::new(frontend)?);
        }
        if let Some(aud) = optional("CREDENTIAL_AUDIENCE") {
            builder = builder.credential_audience(aud);
        }
        if let Some(suffixes) = optional("TRUSTED_RETURN_HOST_SUFFIXES") {
            builder = builder.trusted_return_hosts(TrustedReturnHosts::new(
                TrustedReturnHosts::DEFAULT_EXACT,
                split_list(&suffixes),
            ));
        }
        if let Some(origins) = optional("CORS_ALLOWED_ORIGINS") {
            builder = builder.allowed_origins(AllowedOrigins::new(
                split_list(&origins),
                AllowedOrigins::DEFAULT_HOST_SUFFIXES,
            ));
        }
        if let Some(url) = optional("IKAS_TOKEN_URL") {
            if !url.contains("{shop}") {
                return Err(invalid("IKAS_TOKEN_URL", "must contain '{shop}'".to_string()));
            }
            builder = builder.ikas_token_url(url);
        }
        if let Some(secs) = optional("IKAS_TOKEN_TIMEOUT_SECS") {
            let secs = secs
                .trim()
                .parse::<u64>()
                .map_err(|e| invalid("IKAS_TOKEN_TIMEOUT_SECS", e.to_string()))?;
            builder = builder.ikas_timeout(Duration::from_secs(secs));
        }
        if let Some(host) = optional("FUNCTIONS_HOST") {
            let host = host
                .trim()
                .parse::<IpAddr>()
                .map_err(|e| invalid("FUNCTIONS_HOST", e.to_string()))?;
            builder = builder.host(host);
        }
        if let Some(port) = optional("FUNCTIONS_PORT") {
            let port = port
                .trim()
                .parse::<u16>()
                .map_err(|e| invalid("FUNCTIONS_PORT", e.to_string()))?;
            builder = builder.port(port);
        }

        builder.build()
    }

    /// Returns the OAuth client id.
    #[must_use]
    pub const fn api_key(&self) -> &ApiKey {
        &self.api_key
    }

    /// Returns the OAuth client secret.
    #[must_use]
    pub const fn api_secret_key(&self) -> &ApiSecretKey {
        &self.api_secret_key
    }

    /// Returns the previous OAuth client secret, if configured.
    #[must_use]
    pub const fn old_api_secret_key(&self) -> Option<&ApiSecretKey> {
        self.old_api_secret_key.as_ref()
    }

    /// Returns the requested OAuth scopes.
    #[must_use]
    pub fn scopes(&self) -> &str {
        &self.scopes
    }

    /// Returns the registered OAuth callback URL.
    #[must_use]
    pub const fn redirect_uri(&self) -> &HostUrl {
        &self.redirect_uri
    }

    /// Returns the frontend base URL, if configured.
    #[must_use]
    pub const fn frontend_url(&self) -> Option<&HostUrl> {
        self.frontend_url.as_ref()
    }

    /// Returns the ID token signing secret.
    #[must_use]
    pub const fn credential_secret(&self) -> &ApiSecretKey {
        &self.credential_secret
    }

    /// Returns the required ID token audience, if configured.
    #[must_use]
    pub fn credential_audience(&self) -> Option<&str> {
        self.credential_audience.as_deref()
    }

    /// Returns the return URL allowlist.
    #[must_use]
    pub const fn trusted_return_hosts(&self) -> &TrustedReturnHosts {
        &self.trusted_return_hosts
    }

    /// Returns the CORS origin allowlist.
    #[must_use]
    pub const fn allowed_origins(&self) -> &AllowedOrigins {
        &self.allowed_origins
    }

    /// Returns the Ikas token endpoint template.
    #[must_use]
    pub fn ikas_token_url(&self) -> &str {
        &self.ikas_token_url
    }

    /// Returns the Ikas token request timeout.
    #[must_use]
    pub const fn ikas_timeout(&self) -> Duration {
        self.ikas_timeout
    }

    /// Returns the address the server binds to.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// Verify FunctionsConfig is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<FunctionsConfig>();
};

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Builder for [`FunctionsConfig`].
///
/// Required fields are `api_key`, `api_secret_key`, `redirect_uri` and
/// `credential_secret`.
///
/// # Defaults
///
/// - `scopes`: `read_products`
/// - `trusted_return_hosts`: [`TrustedReturnHosts::default`]
/// - `allowed_origins`: [`AllowedOrigins::default`]
/// - `ikas_token_url`: [`DEFAULT_IKAS_TOKEN_URL`]
/// - `ikas_timeout`: 10 seconds
/// - `host`/`port`: `127.0.0.1:8080`
#[derive(Debug, Default)]
pub struct FunctionsConfigBuilder {
    api_key: Option<ApiKey>,
    api_secret_key: Option<ApiSecretKey>,
    old_api_secret_key: Option<ApiSecretKey>,
    scopes: Option<String>,
    redirect_uri: Option<HostUrl>,
    frontend_url: Option<HostUrl>,
    credential_secret: Option<ApiSecretKey>,
    credential_audience: Option<String>,
    trusted_return_hosts: Option<TrustedReturnHosts>,
    allowed_origins: Option<AllowedOrigins>,
    ikas_token_url: Option<String>,
    ikas_timeout: Option<Duration>,
    host: Option<IpAddr>,
    port: Option<u16>,
}

impl FunctionsConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the OAuth client id (required).
    #[must_use]
    pub fn api_key(mut self, key: ApiKey) -> Self {
        self.api_key = Some(key);
        self
    }

    /// Sets the OAuth client secret (required).
    #[must_use]
    pub fn api_secret_key(mut self, key: ApiSecretKey) -> Self {
        self.api_secret_key = Some(key);
        self
    }

    /// Sets the previous client secret for key rotation.
    #[must_use]
    pub fn old_api_secret_key(mut self, key: ApiSecretKey) -> Self {
        self.old_api_secret_key = Some(key);
        self
    }

    /// Sets the requested OAuth scopes.
    #[must_use]
    pub fn scopes(mut self, scopes: impl Into<String>) -> Self {
        self.scopes = Some(scopes.into());
        self
    }

    /// Sets the OAuth callback URL (required).
    #[must_use]
    pub fn redirect_uri(mut self, url: HostUrl) -> Self {
        self.redirect_uri = Some(url);
        self
    }

    /// Sets the frontend base URL.
    #[must_use]
    pub fn frontend_url(mut self, url: HostUrl) -> Self {
        self.frontend_url = Some(url);
        self
    }

    /// Sets the ID token signing secret (required).
    #[must_use]
    pub fn credential_secret(mut self, secret: ApiSecretKey) -> Self {
        self.credential_secret = Some(secret);
        self
    }

    /// Sets the required ID token audience.
    #[must_use]
    pub fn credential_audience(mut self, audience: impl Into<String>) -> Self {
        self.credential_audience = Some(audience.into());
        self
    }

    /// Sets the return URL allowlist.
    #[must_use]
    pub fn trusted_return_hosts(mut self, hosts: TrustedReturnHosts) -> Self {
        self.trusted_return_hosts = Some(hosts);
        self
    }

    /// Sets the CORS origin allowlist.
    #[must_use]
    pub fn allowed_origins(mut self, origins: AllowedOrigins) -> Self {
        self.allowed_origins = Some(origins);
        self
    }

    /// Sets the Ikas token endpoint template. `{shop}` is replaced by the
    /// store name.
    #[must_use]
    pub fn ikas_token_url(mut self, url: impl Into<String>) -> Self {
        self.ikas_token_url = Some(url.into());
        self
    }

    /// Sets the Ikas token request timeout.
    #[must_use]
    pub const fn ikas_timeout(mut self, timeout: Duration) -> Self {
        self.ikas_timeout = Some(timeout);
        self
    }

    /// Sets the bind address.
    #[must_use]
    pub const fn host(mut self, host: IpAddr) -> Self {
        self.host = Some(host);
        self
    }

    /// Sets the listen port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequiredField`] if a required field is unset.
    pub fn build(self) -> Result<FunctionsConfig, ConfigError> {
        let api_key = self
            .api_key
            .ok_or(ConfigError::MissingRequiredField { field: "api_key" })?;
        let api_secret_key = self.api_secret_key.ok_or(ConfigError::MissingRequiredField {
            field: "api_secret_key",
        })?;
        let redirect_uri = self.redirect_uri.ok_or(ConfigError::MissingRequiredField {
            field: "redirect_uri",
        })?;
        let credential_secret = self
            .credential_secret
            .ok_or(ConfigError::MissingRequiredField {
                field: "credential_secret",
            })?;

        Ok(FunctionsConfig {
            api_key,
            api_secret_key,
            old_api_secret_key: self.old_api_secret_key,
            scopes: self
                .scopes
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SCOPES.to_string()),
            redirect_uri,
            frontend_url: self.frontend_url,
            credential_secret,
            credential_audience: self.credential_audience,
            trusted_return_hosts: self.trusted_return_hosts.unwrap_or_default(),
            allowed_origins: self.allowed_origins.unwrap_or_default(),
            ikas_token_url: self
                .ikas_token_url
                .unwrap_or_else(|| DEFAULT_IKAS_TOKEN_URL.to_string()),
            ikas_timeout: self.ikas_timeout.unwrap_or(DEFAULT_IKAS_TIMEOUT),
            host: self.host.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            port: self.port.unwrap_or(8080),
        })
    }
}
