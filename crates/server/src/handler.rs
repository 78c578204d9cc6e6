//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the offline cache.
use std::sync::Arc;

use crate::tools::cache::{
    CacheFetchParams, CacheGetParams, activate_impl, fetch_impl, get_impl, install_impl, status_impl,
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use sitecache_client::{FetchClient, OfflineCache};

/// The main MCP server handler for sitecache.
#[derive(Clone)]
pub struct SiteCacheServer {
    cache: Arc<OfflineCache<FetchClient>>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
#[tool_router]
impl SiteCacheServer {
    pub fn new(cache: Arc<OfflineCache<FetchClient>>) -> Self {
        Self { cache, tool_router: Self::tool_router() }
    }

    /// Fetch a resource through the offline cache.
    ///
    /// GET requests are answered from the serving generation when it holds
    /// them; everything else goes to the network and is not stored.
    #[tool(
        description = "Fetch a URL cache-first. Returns the stored response when the serving generation has one, otherwise the live network response. Never writes to the cache."
    )]
    async fn cache_fetch(&self, params: Parameters<CacheFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(self.cache.as_ref(), params.0).await
    }

    #[tool(description = "Read the stored response for a URL from the serving generation. Never touches the network.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(self.cache.as_ref(), params.0).await
    }

    #[tool(description = "Report the current and serving cache versions and every stored generation.")]
    async fn cache_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(self.cache.as_ref()).await
    }

    /// Re-run install for the configured version.
    #[tool(description = "Fetch every manifest resource and store them atomically as the current generation. It serves only after cache_activate.")]
    async fn cache_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(self.cache.as_ref()).await
    }

    #[tool(description = "Delete every stored generation other than the current one, then serve from it. Requires the current generation to be installed.")]
    async fn cache_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(self.cache.as_ref()).await
    }
}

impl ServerHandler for SiteCacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "sitecache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(format!(
                "Offline cache of {} manifest entries, current version {}",
                self.cache.manifest().len(),
                self.cache.version()
            )),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitecache_client::{FetchConfig, OfflineConfig, Url};
    use sitecache_core::CacheDb;

    async fn server() -> SiteCacheServer {
        let db = CacheDb::open_in_memory().await.unwrap();
        let fetcher = FetchClient::new(FetchConfig::default()).unwrap();
        let config = OfflineConfig {
            origin: Url::parse("http://blog.test").unwrap(),
            version: "v1".into(),
            manifest: vec!["/".into()],
            max_entry_bytes: 64 * 1024,
        };
        SiteCacheServer::new(Arc::new(OfflineCache::new(db, fetcher, config).unwrap()))
    }

    #[tokio::test]
    async fn test_lists_cache_tools() {
        let server = server().await;
        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();
        assert_eq!(names, vec!["cache_activate", "cache_fetch", "cache_get", "cache_install", "cache_status"]);
    }

    #[tokio::test]
    async fn test_server_info() {
        let info = server().await.get_info();
        assert_eq!(info.server_info.name, "sitecache");
        assert!(info.capabilities.tools.is_some());
    }
}
