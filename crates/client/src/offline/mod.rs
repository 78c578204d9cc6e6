//! Offline cache manager.
//!
//! Answers outgoing resource requests from the stored generation when it
//! can and delegates to the network otherwise. Generations move through
//! `installing → ready → (superseded) → deleted`:
//!
//! - [`OfflineCache::install`] fetches every manifest entry and commits them
//!   with the `ready` flip in one transaction. Any failed or oversized entry
//!   aborts the whole install.
//! - [`OfflineCache::activate`] deletes every generation other than the
//!   configured version, then stamps it activated. Deletion failures are
//!   logged and reported, never fatal.
//! - [`OfflineCache::intercept`] is cache-first against the activated
//!   generation. Misses go to the network and are passed through untouched;
//!   nothing is written back.
//!
//! A generation answers requests only once activated, so an installed
//! upgrade does not serve until its activation has swept older generations.
//!
//! Install and activate are serialized on a lifecycle lock. Intercept never
//! takes it and only ever reads whole generations.

mod report;

use futures_util::future::try_join_all;
use reqwest::Url;
use tokio::sync::Mutex;

use sitecache_core::{AppConfig, CacheDb, Error, Generation, RequestKey, StoredResponse};

use crate::fetch::{FetchResponse, Fetcher, ResourceRequest, canonicalize, header_pairs, resolve};

pub use report::{ActivationReport, CacheStatus, InstallReport, ResponseSource};

/// Explicit configuration for one cache version.
#[derive(Debug, Clone)]
pub struct OfflineConfig {
    /// Origin that manifest paths resolve against.
    pub origin: Url,
    /// Identifier of the current generation.
    pub version: String,
    /// Ordered resource paths to precache.
    pub manifest: Vec<String>,
    /// Largest body install will store for one entry.
    pub max_entry_bytes: usize,
}

impl TryFrom<&AppConfig> for OfflineConfig {
    type Error = Error;

    fn try_from(config: &AppConfig) -> Result<Self, Error> {
        let origin = canonicalize(&config.origin).map_err(|e| Error::InvalidUrl(format!("origin: {e}")))?;
        Ok(Self {
            origin,
            version: config.cache_version.clone(),
            manifest: config.manifest.clone(),
            max_entry_bytes: config.max_bytes,
        })
    }
}

/// A response to an intercepted request.
#[derive(Debug, Clone)]
pub enum Served {
    /// Answered from the serving generation without touching the network.
    Cache(StoredResponse),
    /// Passed through from the network as received.
    Network(FetchResponse),
}

impl Served {
    pub fn source(&self) -> ResponseSource {
        match self {
            Served::Cache(_) => ResponseSource::Cache,
            Served::Network(_) => ResponseSource::Network,
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            Served::Cache(stored) => stored.status_code,
            Served::Network(response) => response.status.as_u16(),
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        match self {
            Served::Cache(stored) => stored.content_type.as_deref(),
            Served::Network(response) => response.content_type.as_deref(),
        }
    }

    pub fn headers(&self) -> Vec<(String, String)> {
        match self {
            Served::Cache(stored) => stored.headers.clone(),
            Served::Network(response) => header_pairs(&response.headers),
        }
    }

    pub fn body(&self) -> &[u8] {
        match self {
            Served::Cache(stored) => &stored.body,
            Served::Network(response) => &response.bytes,
        }
    }
}

/// Cache-first request interceptor with versioned generations.
pub struct OfflineCache<F> {
    db: CacheDb,
    fetcher: F,
    origin: Url,
    version: String,
    manifest: Vec<Url>,
    max_entry_bytes: usize,
    lifecycle: Mutex<()>,
}

impl<F: Fetcher> OfflineCache<F> {
    /// Build a manager for `config.version`.
    ///
    /// Resolves every manifest entry against the origin up front.
    ///
    /// # Errors
    ///
    /// `INVALID_URL` if an entry cannot be resolved, `INVALID_INPUT` if the
    /// version is empty or two entries resolve to the same URL.
    pub fn new(db: CacheDb, fetcher: F, config: OfflineConfig) -> Result<Self, Error> {
        if config.version.trim().is_empty() {
            return Err(Error::InvalidInput("cache version must not be empty".into()));
        }

        let mut manifest: Vec<Url> = Vec::with_capacity(config.manifest.len());
        for entry in &config.manifest {
            let url = resolve(&config.origin, entry).map_err(|e| Error::InvalidUrl(format!("{entry}: {e}")))?;
            if manifest.contains(&url) {
                return Err(Error::InvalidInput(format!("duplicate manifest entry: {url}")));
            }
            manifest.push(url);
        }

        Ok(Self {
            db,
            fetcher,
            origin: config.origin,
            version: config.version,
            manifest,
            max_entry_bytes: config.max_entry_bytes,
            lifecycle: Mutex::new(()),
        })
    }

    /// The configured current version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Resolved manifest URLs, in manifest order.
    pub fn manifest(&self) -> &[Url] {
        &self.manifest
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Resolve a path or absolute URL against the origin.
    pub fn resolve(&self, input: &str) -> Result<Url, Error> {
        resolve(&self.origin, input).map_err(|e| Error::InvalidUrl(format!("{input}: {e}")))
    }

    fn install_failed(&self, reason: impl Into<String>) -> Error {
        Error::InstallFailed { version: self.version.clone(), reason: reason.into() }
    }

    /// Populate the current generation from the manifest.
    ///
    /// # Errors
    ///
    /// `INSTALL_FAILED` if any entry fails to fetch, answers with a
    /// non-success status, exceeds `max_entry_bytes`, or the commit fails. A generation created by this
    /// call is removed again; an already-ready one keeps its previous entries.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let _guard = self.lifecycle.lock().await;
        let version = self.version.as_str();

        let created = self
            .db
            .begin_generation(version)
            .await
            .map_err(|e| self.install_failed(format!("could not create generation: {e}")))?;

        tracing::info!(version, entries = self.manifest.len(), created, "installing cache generation");

        match self.populate().await {
            Ok(entries) => {
                tracing::info!(version, entries, "cache generation ready");
                Ok(InstallReport { version: self.version.clone(), entries })
            }
            Err(err) => {
                if created && let Err(e) = self.db.delete_generation(version).await {
                    tracing::warn!(version, error = %e, "could not remove failed generation");
                }
                tracing::warn!(version, error = %err, "install failed");
                Err(err)
            }
        }
    }

    async fn populate(&self) -> Result<u64, Error> {
        let entries = try_join_all(self.manifest.iter().map(|url| self.fetch_entry(url))).await?;

        self.db
            .commit_generation(&self.version, &entries)
            .await
            .map_err(|e| self.install_failed(format!("could not store entries: {e}")))
    }

    async fn fetch_entry(&self, url: &Url) -> Result<StoredResponse, Error> {
        let request = ResourceRequest::get(url.clone()).with_max_bytes(self.max_entry_bytes);
        let response = self
            .fetcher
            .fetch(&request)
            .await
            .map_err(|e| self.install_failed(format!("{url}: {e}")))?;

        if !response.status.is_success() {
            return Err(self.install_failed(format!("{url}: status {}", response.status.as_u16())));
        }
        if response.bytes.len() > self.max_entry_bytes {
            return Err(self.install_failed(format!(
                "{url}: {} bytes exceeds {}",
                response.bytes.len(),
                self.max_entry_bytes
            )));
        }

        Ok(response.to_stored(&request.key()))
    }

    /// Answer `request` from the serving generation, or from the network.
    ///
    /// Cache-layer faults are logged and fall through to the network; the
    /// only errors returned are the fetcher's own, unchanged.
    pub async fn intercept(&self, request: &ResourceRequest) -> Result<Served, Error> {
        let key = request.key();

        if key.is_cacheable() {
            match self.match_serving(&key).await {
                Ok(Some(stored)) => {
                    tracing::debug!(%key, "cache hit");
                    return Ok(Served::Cache(stored));
                }
                Ok(None) => tracing::debug!(%key, "cache miss"),
                Err(e) => tracing::warn!(%key, error = %e, "cache lookup failed, using network"),
            }
        }

        let response = self.fetcher.fetch(request).await?;
        Ok(Served::Network(response))
    }

    /// Cache-only lookup; never touches the network.
    ///
    /// # Errors
    ///
    /// `CACHE_MISS` when no serving generation holds the request.
    pub async fn lookup(&self, request: &ResourceRequest) -> Result<StoredResponse, Error> {
        let key = request.key();
        self.match_serving(&key)
            .await?
            .ok_or_else(|| Error::CacheMiss(key.to_string()))
    }

    async fn match_serving(&self, key: &RequestKey) -> Result<Option<StoredResponse>, Error> {
        let Some(serving) = self.db.serving_generation(&self.version).await? else {
            return Ok(None);
        };
        self.db.match_entry(&serving, key).await
    }

    /// Make the current version the only stored generation.
    ///
    /// # Errors
    ///
    /// `NOT_INSTALLED` if the current version is not ready; nothing is
    /// deleted in that case. Individual deletion failures do not fail the
    /// call; they are listed in [`ActivationReport::failed`].
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        let _guard = self.lifecycle.lock().await;
        let current = self.version.as_str();

        let ready = self
            .db
            .get_generation(current)
            .await?
            .is_some_and(|generation| generation.is_ready());
        if !ready {
            return Err(Error::NotInstalled(self.version.clone()));
        }

        let mut report = ActivationReport::new(current);
        for version in self.db.generation_versions().await? {
            if version == current {
                continue;
            }
            match self.db.delete_generation(&version).await {
                Ok(true) => {
                    tracing::info!(version = %version, current, "deleted stale generation");
                    report.deleted.push(version);
                }
                Ok(false) => {}
                Err(e) => {
                    let err = Error::CleanupFailed { version: version.clone(), reason: e.to_string() };
                    tracing::warn!(error = %err, current, "stale generation left for a later activation");
                    report.failed.push(version);
                }
            }
        }

        if self.db.mark_activated(current).await? {
            tracing::info!(version = current, "cache generation activated");
        }

        Ok(report)
    }

    /// Current and serving versions plus every stored generation.
    pub async fn status(&self) -> Result<CacheStatus, Error> {
        let generations: Vec<Generation> = self.db.list_generations().await?;
        let serving_version = self.db.serving_generation(&self.version).await?;
        Ok(CacheStatus { current_version: self.version.clone(), serving_version, generations })
    }
}
