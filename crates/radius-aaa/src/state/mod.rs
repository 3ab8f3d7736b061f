//! Cache backend abstraction
//!
//! NAS records and subscriber sessions live in the cache as flat string
//! hashes, found through exact-match TAG indexes rather than by key.
//!
//! - **MemoryCacheStore**: local in-memory hashes (tests, single-node dev)
//! - **ValkeyCacheStore**: Valkey with the RediSearch module (`FT.SEARCH`)
//!
//! # Key Design
//!
//! ```text
//! {key_prefix}{entity prefix}{identifier}
//!
//! Examples:
//! - radius_nas:12
//! - subscriber:10.20.0.7
//! - subscriber:2001:db8:1::
//! ```

pub mod config;
pub mod error;
pub mod memory;
pub mod query;
pub mod valkey;

pub use config::ValkeyConfig;
pub use error::StateError;
pub use memory::MemoryCacheStore;
pub use query::{IndexDefinition, NAS_INDEX, SUBSCRIBER_INDEX, TagQuery, escape_tag_value};
pub use valkey::ValkeyCacheStore;

use async_trait::async_trait;
use std::collections::HashMap;

/// Field name to value, the shape of every cached hash
pub type FieldMap = HashMap<String, String>;

/// One search hit: the hash key and all of its fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub fields: FieldMap,
}

/// Cache operations needed by the secret resolver and the session tracker.
///
/// Implementations must be thread-safe; one instance is shared by every
/// listener task.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Exact-match search on one TAG field of `index`, at most `limit` hits
    async fn search(
        &self,
        index: &IndexDefinition,
        query: &TagQuery,
        limit: usize,
    ) -> Result<Vec<CacheEntry>, StateError>;

    /// Write (or overwrite) fields of the hash at `key`
    async fn hset(&self, key: &str, fields: &FieldMap) -> Result<(), StateError>;

    /// Delete a key
    ///
    /// Returns `Ok(())` regardless of whether the key existed.
    async fn delete(&self, key: &str) -> Result<(), StateError>;

    /// Health check / connectivity test
    async fn ping(&self) -> Result<(), StateError>;
}
