//! Test doubles shared by the cache tool tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use rmcp::model::CallToolResult;
use sitecache_client::{
    Bytes, FetchResponse, Fetcher, OfflineCache, OfflineConfig, ResourceRequest, StatusCode, Url, header,
};
use sitecache_core::{CacheDb, Error};

pub const ORIGIN: &str = "http://blog.test";

/// Serves fixed bodies by path; unknown paths get a 404.
#[derive(Default)]
pub struct SiteFetcher {
    pages: HashMap<String, String>,
    down: HashSet<String>,
    calls: AtomicUsize,
}

impl SiteFetcher {
    pub fn page(mut self, path: &str, body: &str) -> Self {
        self.pages.insert(path.to_string(), body.to_string());
        self
    }

    pub fn down(mut self, path: &str) -> Self {
        self.down.insert(path.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Fetcher for SiteFetcher {
    async fn fetch(&self, request: &ResourceRequest) -> Result<FetchResponse, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let path = request.url.path();

        if self.down.contains(path) {
            return Err(Error::HttpError("network error: connection reset".into()));
        }

        let (status, body) = match self.pages.get(path) {
            Some(body) => (StatusCode::OK, body.clone()),
            None => (StatusCode::NOT_FOUND, "not found".to_string()),
        };
        let mut headers = header::HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static("text/html"));

        Ok(FetchResponse {
            url: request.url.clone(),
            final_url: request.url.clone(),
            status,
            content_type: Some("text/html".to_string()),
            bytes: Bytes::from(body),
            headers,
            fetch_ms: 0,
        })
    }
}

pub fn blog() -> SiteFetcher {
    SiteFetcher::default()
        .page("/", "<h1>Bloga</h1>")
        .page("/static/css/main.css", "body{margin:0}")
        .page("/about/", "<p>about</p>")
}

pub fn cache_with(db: &CacheDb, version: &str, fetcher: SiteFetcher) -> OfflineCache<SiteFetcher> {
    let config = OfflineConfig {
        origin: Url::parse(ORIGIN).unwrap(),
        version: version.to_string(),
        manifest: vec!["/".to_string(), "/static/css/main.css".to_string()],
        max_entry_bytes: 64 * 1024,
    };
    OfflineCache::new(db.clone(), fetcher, config).unwrap()
}

/// Parse the JSON text content of a tool result.
pub fn output<T: serde::de::DeserializeOwned>(result: &CallToolResult) -> T {
    let content_val = serde_json::to_value(&result.content[0]).unwrap();
    let text = content_val
        .get("text")
        .and_then(|v| v.as_str())
        .expect("Expected text field in content");
    serde_json::from_str(text).unwrap()
}
