//! Application state shared across handlers.

use std::sync::Arc;

use crate::auth::{CredentialVerifier, JwtCredentialVerifier};
use crate::config::FunctionsConfig;
use crate::platforms::{IkasClient, IkasError};
use crate::store::{AccountStore, CheckoutEventStore, VerificationStore};

/// Shared handler state.
///
/// Cheaply cloneable; stores, clients and the credential verifier are built
/// once at startup.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: FunctionsConfig,
    states: Arc<dyn VerificationStore>,
    accounts: Arc<dyn AccountStore>,
    events: Arc<dyn CheckoutEventStore>,
    verifier: Arc<dyn CredentialVerifier>,
    ikas: IkasClient,
}

impl AppState {
    /// Creates state backed by one store implementing every persistence
    /// trait, with the JWT credential verifier and an Ikas client taken from
    /// `config`.
    ///
    /// # Errors
    ///
    /// Returns [`IkasError::Client`] if the Ikas HTTP client cannot be built.
    pub fn new<S>(config: FunctionsConfig, store: Arc<S>) -> Result<Self, IkasError>
    where
        S: VerificationStore + AccountStore + CheckoutEventStore + 'static,
    {
        let verifier = Arc::new(JwtCredentialVerifier::from_config(&config));
        let ikas = IkasClient::from_config(&config)?;
        Ok(Self::from_parts(
            config,
            store.clone(),
            store.clone(),
            store,
            verifier,
            ikas,
        ))
    }

    /// Creates state from individually constructed parts.
    #[must_use]
    pub fn from_parts(
        config: FunctionsConfig,
        states: Arc<dyn VerificationStore>,
        accounts: Arc<dyn AccountStore>,
        events: Arc<dyn CheckoutEventStore>,
        verifier: Arc<dyn CredentialVerifier>,
        ikas: IkasClient,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                states,
                accounts,
                events,
                verifier,
                ikas,
            }),
        }
    }

    /// Service configuration.
    #[must_use]
    pub fn config(&self) -> &FunctionsConfig {
        &self.inner.config
    }

    /// Verification state store.
    #[must_use]
    pub fn states(&self) -> &dyn VerificationStore {
        self.inner.states.as_ref()
    }

    /// Account and binding store.
    #[must_use]
    pub fn accounts(&self) -> &dyn AccountStore {
        self.inner.accounts.as_ref()
    }

    /// Checkout event store.
    #[must_use]
    pub fn events(&self) -> &dyn CheckoutEventStore {
        self.inner.events.as_ref()
    }

    /// Credential verifier.
    #[must_use]
    pub fn verifier(&self) -> &dyn CredentialVerifier {
        self.inner.verifier.as_ref()
    }

    /// Ikas token client.
    #[must_use]
    pub fn ikas(&self) -> &IkasClient {
        &self.inner.ikas
    }
}

// Verify types are Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<AppState>();
};
