//! Client code for sitecache.
//!
//! This crate provides the HTTP fetch layer and the offline cache manager
//! that sits between request callers and the network.

pub mod fetch;
pub mod offline;

pub use fetch::{FetchClient, FetchConfig, FetchResponse, Fetcher, ResourceRequest};
pub use offline::{ActivationReport, CacheStatus, InstallReport, OfflineCache, OfflineConfig, ResponseSource, Served};

pub use bytes::Bytes;
pub use reqwest::{Method, StatusCode, Url, header};
