//! cache_status tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sitecache_client::{Fetcher, OfflineCache};
use sitecache_core::Generation;

use crate::tools::json_result;

/// Output from the cache_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatusOutput {
    pub current_version: String,
    /// Generation answering cache_fetch, if any.
    pub serving_version: Option<String>,
    pub generations: Vec<Generation>,
}

/// Implementation of the cache_status tool.
pub async fn status_impl<F: Fetcher>(cache: &OfflineCache<F>) -> Result<CallToolResult, McpError> {
    let status = cache.status().await?;

    json_result(&CacheStatusOutput {
        current_version: status.current_version,
        serving_version: status.serving_version,
        generations: status.generations,
    })
}
