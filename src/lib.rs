//! # Shop Verify
//!
//! HTTP functions that prove a merchant owns a storefront and ingest the
//! storefront's checkout events exactly once.
//!
//! ## Overview
//!
//! This crate provides:
//! - Type-safe configuration via [`FunctionsConfig`] and [`FunctionsConfigBuilder`]
//! - Validated newtypes for credentials, shop domains and trusted URLs
//! - A three-step Shopify OAuth ownership handshake via [`auth::oauth`]
//! - Ikas store connection over client credentials via [`platforms`]
//! - Idempotent checkout event ingestion and per-shop statistics via [`ingest`]
//! - Async persistence traits with an in-memory implementation via [`store`]
//! - An axum router exposing all of the above via [`http`]
//!
//! ## Quick Start
//!
//! ```rust
//! use shop_verify::{ApiKey, ApiSecretKey, FunctionsConfig, HostUrl};
//!
//! let config = FunctionsConfig::builder()
//!     .api_key(ApiKey::new("your-api-key").unwrap())
//!     .api_secret_key(ApiSecretKey::new("your-api-secret").unwrap())
//!     .redirect_uri(HostUrl::new("https://functions.example.com/shopify_callback").unwrap())
//!     .credential_secret(ApiSecretKey::new("your-credential-secret").unwrap())
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.scopes(), "read_products");
//! ```
//!
//! ## Serving
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use shop_verify::http::{router, AppState};
//! use shop_verify::store::MemoryStore;
//!
//! let state = AppState::new(config, Arc::new(MemoryStore::new()))?;
//! let listener = tokio::net::TcpListener::bind(config.socket_addr()).await?;
//! axum::serve(listener, router(state)).await?;
//! ```
//!
//! ## Design Principles
//!
//! - **No global state**: configuration is built once and passed explicitly
//! - **Fail-fast validation**: newtypes validate on construction
//! - **Atomic store operations**: every state transition is one store call
//! - **Opaque server errors**: store failures are logged, never echoed

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod ingest;
pub mod platforms;
pub mod store;

pub use config::{
    AllowedOrigins, ApiKey, ApiSecretKey, FunctionsConfig, FunctionsConfigBuilder, HostUrl,
    ShopDomain, TrustedReturnHosts,
};
pub use error::ConfigError;

pub use auth::oauth::{OAuthError, StateId};
pub use auth::{AccountId, CredentialVerifier, JwtCredentialVerifier};
pub use store::{MemoryStore, StoreError};
