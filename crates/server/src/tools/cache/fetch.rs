//! cache_fetch tool implementation.
//!
//! Runs a request through the offline cache: stored response if the serving
//! generation has one, otherwise the network response as received.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sitecache_client::{Fetcher, Method, OfflineCache, ResourceRequest};
use sitecache_core::Error;

use crate::tools::{body_text, json_result};

/// Parameters for the cache_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheFetchParams {
    /// Path (resolved against the origin) or absolute URL to request.
    pub url: String,

    /// HTTP method (default: GET). Only GET requests can be answered from the cache.
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the cache_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheFetchOutput {
    /// "cache" or "network".
    pub source: String,
    /// Canonical URL that was requested.
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    /// Body text, when the body is valid UTF-8.
    pub body: Option<String>,
    pub body_bytes: usize,
}

/// Implementation of the cache_fetch tool.
pub async fn fetch_impl<F: Fetcher>(cache: &OfflineCache<F>, params: CacheFetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let method = Method::from_bytes(params.method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| Error::InvalidInput(format!("invalid method: {}", params.method)))?;
    let url = cache.resolve(&params.url)?;
    let request = ResourceRequest::new(method, url);

    let served = cache.intercept(&request).await?;

    let output = CacheFetchOutput {
        source: served.source().as_str().to_string(),
        url: request.url.to_string(),
        status: served.status(),
        content_type: served.content_type().map(str::to_string),
        headers: served.headers(),
        body: body_text(served.body()),
        body_bytes: served.body().len(),
    };

    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::cache::testing::{blog, cache_with, output};
    use sitecache_core::CacheDb;

    fn params(url: &str) -> CacheFetchParams {
        CacheFetchParams { url: url.to_string(), method: default_method() }
    }

    #[tokio::test]
    async fn test_fetch_from_cache() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let cache = cache_with(&db, "v1", blog());
        cache.install().await.unwrap();
        cache.activate().await.unwrap();

        let result = fetch_impl(&cache, params("/static/css/main.css")).await.unwrap();
        let out: CacheFetchOutput = output(&result);
        assert_eq!(out.source, "cache");
        assert_eq!(out.url, "http://blog.test/static/css/main.css");
        assert_eq!(out.status, 200);
        assert_eq!(out.body.as_deref(), Some("body{margin:0}"));
        assert_eq!(out.body_bytes, 14);
        assert_eq!(cache.fetcher().calls(), 2);
    }

    #[tokio::test]
    async fn test_fetch_before_activation_uses_network() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let cache = cache_with(&db, "v1", blog());
        cache.install().await.unwrap();

        let out: CacheFetchOutput = output(&fetch_impl(&cache, params("/")).await.unwrap());
        assert_eq!(out.source, "network");
        assert_eq!(cache.fetcher().calls(), 3);
    }

    #[tokio::test]
    async fn test_fetch_from_network() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let cache = cache_with(&db, "v1", blog());
        cache.install().await.unwrap();

        let result = fetch_impl(&cache, params("/about/")).await.unwrap();
        let out: CacheFetchOutput = output(&result);
        assert_eq!(out.source, "network");
        assert_eq!(out.body.as_deref(), Some("<p>about</p>"));
        assert_eq!(cache.fetcher().calls(), 3);
    }

    #[tokio::test]
    async fn test_fetch_post_bypasses_cache() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let cache = cache_with(&db, "v1", blog());
        cache.install().await.unwrap();

        let params = CacheFetchParams { url: "/".into(), method: "post".into() };
        let out: CacheFetchOutput = output(&fetch_impl(&cache, params).await.unwrap());
        assert_eq!(out.source, "network");
    }

    #[tokio::test]
    async fn test_fetch_network_error() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let cache = cache_with(&db, "v1", blog().down("/feed/"));

        let err = fetch_impl(&cache, params("/feed/")).await.unwrap_err();
        assert_eq!(err.code.0, -32008);
    }

    #[tokio::test]
    async fn test_fetch_empty_url() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let cache = cache_with(&db, "v1", blog());

        let result = fetch_impl(&cache, params("  ")).await;
        assert!(result.is_err());
        assert_eq!(cache.fetcher().calls(), 0);
    }

    #[tokio::test]
    async fn test_fetch_invalid_method() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let cache = cache_with(&db, "v1", blog());

        let params = CacheFetchParams { url: "/".into(), method: "GE T".into() };
        let err = fetch_impl(&cache, params).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }
}
