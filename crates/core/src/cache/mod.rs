//! SQLite-backed store for versioned cache generations.
//!
//! Each generation is identified by a version string and owns a set of
//! stored responses keyed by request. It supports:
//!
//! - Request keys hashed with SHA-256
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Atomic population and cascade deletion of generations

pub mod connection;
pub mod entries;
pub mod generations;
pub mod key;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::StoredResponse;
pub use generations::{Generation, GenerationState};
pub use key::RequestKey;
