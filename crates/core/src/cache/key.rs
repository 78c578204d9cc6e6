//! Request keys.
//!
//! A key is the upper-cased method plus the canonical absolute URL. Only the
//! hash is used for lookups; method and URL are stored alongside for display.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Canonical identifier for a fetchable resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct RequestKey {
    pub method: String,
    pub url: String,
}

impl RequestKey {
    /// Build a key from a method and an already-canonical URL.
    pub fn new(method: &str, url: &str) -> Self {
        Self { method: method.trim().to_ascii_uppercase(), url: url.trim().to_string() }
    }

    /// Key for a GET request.
    pub fn get(url: &str) -> Self {
        Self::new("GET", url)
    }

    /// Only GET requests are ever stored or matched.
    pub fn is_cacheable(&self) -> bool {
        self.method == "GET"
    }

    /// Storage hash of this key.
    pub fn hash(&self) -> String {
        compute_cache_key(&self.method, &self.url)
    }
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Compute the hex SHA-256 storage key for a request.
pub fn compute_cache_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
