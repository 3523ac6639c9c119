//! City keys.

use serde::{Deserialize, Serialize};

/// A city as requested by a caller.
///
/// The display name is kept verbatim (it is what the provider is queried with);
/// equality and hashing use a case-insensitive, whitespace-trimmed key so that
/// `"Delhi"` and `" delhi "` share one buffer and one set of historical rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct City {
    name: String,
    key: String,
}

impl City {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let key = name.trim().to_lowercase();
        Self { name, key }
    }

    /// Name as supplied by the caller.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalized lookup key.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl PartialEq for City {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for City {}

impl core::hash::Hash for City {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl core::fmt::Display for City {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for City {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for City {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<City> for String {
    fn from(value: City) -> Self {
        value.name
    }
}
