use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized identifier a shop's checkout events are filed under.
///
/// Built from a free-form affiliation string: lowercased, then every
/// character outside `[a-z0-9-.]` removed. Normalizing a key again yields the
/// same key.
///
/// ```rust
/// use shop_verify::ingest::ShopKey;
///
/// let key = ShopKey::normalize("Dev-Konsiyer.IKAS.shop / TR").unwrap();
/// assert_eq!(key.as_ref(), "dev-konsiyer.ikas.shoptr");
/// assert!(ShopKey::normalize("!!!").is_none());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShopKey(String);

impl ShopKey {
    /// Normalizes an affiliation. Returns `None` when nothing survives.
    #[must_use]
    pub fn normalize(affiliation: &str) -> Option<Self> {
        let key: String = affiliation
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-' || *c == '.')
            .collect();
        if key.is_empty() {
            None
        } else {
            Some(Self(key))
        }
    }
}

impl AsRef<str> for ShopKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShopKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
