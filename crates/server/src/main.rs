//! sitecache server entry point.
//!
//! Loads configuration, runs install and activate for the configured cache
//! version, then serves the cache tools on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use sitecache_client::{FetchClient, FetchConfig, OfflineCache, OfflineConfig};
use sitecache_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

mod handler;
mod lifecycle;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        db_path = %config.db_path.display(),
        origin = %config.origin,
        cache_version = %config.cache_version,
        "Starting sitecache server on stdio transport"
    );

    let db = CacheDb::open(&config.db_path).await?;
    let fetcher = FetchClient::new(FetchConfig::from(&config))?;
    let cache = Arc::new(OfflineCache::new(db, fetcher, OfflineConfig::try_from(&config)?)?);

    lifecycle::boot(cache.as_ref()).await;

    let handler = handler::SiteCacheServer::new(cache);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
