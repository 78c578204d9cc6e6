//! Results of lifecycle operations.

use serde::{Deserialize, Serialize};
use sitecache_core::Generation;

/// Where an intercepted response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Cache,
    Network,
}

impl ResponseSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseSource::Cache => "cache",
            ResponseSource::Network => "network",
        }
    }
}

/// Outcome of a successful install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReport {
    pub version: String,
    pub entries: u64,
}

/// Outcome of an activation sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationReport {
    /// The version that is now current.
    pub version: String,
    /// Stale generations removed by this sweep.
    pub deleted: Vec<String>,
    /// Stale generations that could not be removed.
    pub failed: Vec<String>,
}

impl ActivationReport {
    pub(crate) fn new(version: &str) -> Self {
        Self { version: version.to_string(), deleted: Vec::new(), failed: Vec::new() }
    }

    /// True when no stale generation was left behind.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Snapshot of the store as seen by one manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatus {
    pub current_version: String,
    /// Generation currently answering intercepted requests, if any.
    pub serving_version: Option<String>,
    pub generations: Vec<Generation>,
}
