//! Cache-related MCP tools.
//!
//! Thin adapters from tool parameters onto [`sitecache_client::OfflineCache`].

pub mod fetch;
pub mod get;
pub mod lifecycle;
pub mod status;

pub use fetch::{CacheFetchParams, fetch_impl};
pub use get::{CacheGetParams, get_impl};
pub use lifecycle::{activate_impl, install_impl};
pub use status::status_impl;

#[cfg(test)]
pub(crate) mod testing;
