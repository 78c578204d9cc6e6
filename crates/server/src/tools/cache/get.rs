//! cache_get tool implementation.
//!
//! Retrieves the stored response for a URL without touching the network.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sitecache_client::{Fetcher, OfflineCache, ResourceRequest};

use crate::tools::{body_text, json_result};

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Path (resolved against the origin) or absolute URL of the stored resource.
    pub url: String,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub body_bytes: usize,
    pub stored_at: String,
}

/// Implementation of the cache_get tool.
pub async fn get_impl<F: Fetcher>(cache: &OfflineCache<F>, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let url = cache.resolve(&params.url)?;
    let stored = cache.lookup(&ResourceRequest::get(url)).await?;

    let output = CacheGetOutput {
        body: body_text(&stored.body),
        body_bytes: stored.body.len(),
        url: stored.url,
        final_url: stored.final_url,
        status: stored.status_code,
        content_type: stored.content_type,
        headers: stored.headers,
        stored_at: stored.stored_at,
    };

    json_result(&output)
}
