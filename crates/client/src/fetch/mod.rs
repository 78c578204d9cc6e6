//! HTTP fetch layer.
//!
//! ### URL Canonicalization
//! - Trim whitespace, resolve paths against the configured origin
//! - Lowercase host, remove fragments
//! - Preserve query string
//!
//! ### Network Semantics
//! - Responses are returned as received, whatever their status
//! - Max redirects: 5
//! - Body size is only capped when the request carries a limit (install does)
//! - Transport errors map to `HTTP_ERROR`, timeouts to `FETCH_TIMEOUT`

pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use reqwest::{Client, Method, StatusCode, header};
use std::time::{Duration, Instant};

pub use self::url::{UrlError, canonicalize, resolve};

use sitecache_core::{AppConfig, Error, RequestKey, StoredResponse};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "sitecache/0.1")
    pub user_agent: String,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "sitecache/0.1".to_string(),
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// An outgoing resource request.
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    pub method: Method,
    pub url: Url,
    pub headers: header::HeaderMap,
    /// Reject bodies larger than this many bytes. `None` passes any size through.
    pub max_bytes: Option<usize>,
}

impl ResourceRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url, headers: header::HeaderMap::new(), max_bytes: None }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    /// The key this request is stored and matched under.
    pub fn key(&self) -> RequestKey {
        RequestKey::new(self.method.as_str(), self.url.as_str())
    }
}

/// Response from a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The original URL requested
    pub url: Url,
    /// The final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Response body bytes
    pub bytes: Bytes,
    /// Response headers
    pub headers: header::HeaderMap,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

impl FetchResponse {
    /// Snapshot this response for storage under `key`.
    pub fn to_stored(&self, key: &RequestKey) -> StoredResponse {
        StoredResponse {
            key_hash: key.hash(),
            method: key.method.clone(),
            url: key.url.clone(),
            final_url: self.final_url.to_string(),
            status_code: self.status.as_u16(),
            content_type: self.content_type.clone(),
            headers: header_pairs(&self.headers),
            body: self.bytes.to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Flatten a header map into (name, value) pairs, in map order.
pub fn header_pairs(headers: &header::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
        .collect()
}

/// The network primitive the offline cache delegates to.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Issue `request` and return the response as received.
    async fn fetch(&self, request: &ResourceRequest) -> Result<FetchResponse, Error>;
}

/// HTTP fetch client backed by reqwest.
pub struct FetchClient {
    http: Client,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http })
    }
}

fn too_large(len: usize, limit: usize) -> Error {
    Error::FetchTooLarge(format!("{} bytes exceeds {}", len, limit))
}

fn network_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout(err.to_string())
    } else {
        Error::HttpError(format!("network error: {}", err))
    }
}

#[async_trait]
impl Fetcher for FetchClient {
    async fn fetch(&self, request: &ResourceRequest) -> Result<FetchResponse, Error> {
        let start = Instant::now();

        let mut builder = self
            .http
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if !request.headers.contains_key(header::ACCEPT) {
            builder = builder.header(header::ACCEPT, "*/*");
        }

        let response = builder.send().await.map_err(network_error)?;

        if let Some(limit) = request.max_bytes
            && let Some(len) = response.content_length()
            && len as usize > limit
        {
            return Err(too_large(len as usize, limit));
        }

        let status = response.status();
        let final_url = response.url().clone();
        let headers = response.headers().clone();

        let bytes = response.bytes().await.map_err(network_error)?;

        if let Some(limit) = request.max_bytes
            && bytes.len() > limit
        {
            return Err(too_large(bytes.len(), limit));
        }

        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            "fetched {} {} -> {} {} in {}ms ({} bytes)",
            request.method,
            request.url,
            final_url,
            status.as_u16(),
            fetch_ms,
            bytes.len()
        );

        Ok(FetchResponse { url: request.url.clone(), final_url, status, content_type, bytes, headers, fetch_ms })
    }
}
