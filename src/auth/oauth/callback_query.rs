//! Query parameters received on the OAuth callback.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

/// Parameters excluded from the signed message.
const UNSIGNED_PARAMS: [&str; 2] = ["hmac", "signature"];

/// All query parameters of a callback request.
///
/// Shopify may add parameters over time (`host`, `timestamp`, ...). The
/// signature covers every one of them, so the full set is kept rather than a
/// fixed struct.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct CallbackQuery {
    params: BTreeMap<String, String>,
}

impl CallbackQuery {
    /// Builds a query from key/value pairs. Later duplicates win.
    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            params: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Sets a parameter, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }

    /// Returns a parameter value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Returns a parameter value if present and not blank.
    fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.trim().is_empty())
    }

    /// The `shop` parameter.
    #[must_use]
    pub fn shop(&self) -> Option<&str> {
        self.non_empty("shop")
    }

    /// The `hmac` parameter.
    #[must_use]
    pub fn hmac(&self) -> Option<&str> {
        self.non_empty("hmac")
    }

    /// The `state` parameter.
    #[must_use]
    pub fn state(&self) -> Option<&str> {
        self.non_empty("state")
    }

    /// Builds the message Shopify signed.
    ///
    /// Every parameter except `hmac` and `signature`, sorted by key, each key
    /// and value form encoded (space as `+`, unreserved characters kept,
    /// everything else percent encoded), joined as `k=v&k=v`.
    #[must_use]
    pub fn to_signable_string(&self) -> String {
        self.params
            .iter()
            .filter(|(k, _)| !UNSIGNED_PARAMS.contains(&k.as_str()))
            .map(|(k, v)| format!("{}={}", form_encode(k), form_encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl From<HashMap<String, String>> for CallbackQuery {
    fn from(params: HashMap<String, String>) -> Self {
        Self::from_pairs(params)
    }
}

fn form_encode(value: &str) -> String {
    urlencoding::encode(value).replace("%20", "+")
}
