//! cache_install and cache_activate tool implementations.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use sitecache_client::{Fetcher, OfflineCache};

use crate::tools::json_result;

/// Implementation of the cache_install tool.
pub async fn install_impl<F: Fetcher>(cache: &OfflineCache<F>) -> Result<CallToolResult, McpError> {
    let report = cache.install().await?;
    json_result(&report)
}

/// Implementation of the cache_activate tool.
pub async fn activate_impl<F: Fetcher>(cache: &OfflineCache<F>) -> Result<CallToolResult, McpError> {
    let report = cache.activate().await?;
    json_result(&report)
}
