//! Core types and shared functionality for sitecache.
//!
//! This crate provides:
//! - Generation store with SQLite backend
//! - Request keys and stored response snapshots
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, Generation, GenerationState, RequestKey, StoredResponse};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
