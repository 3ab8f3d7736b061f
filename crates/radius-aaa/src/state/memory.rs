//! In-memory cache backend

use super::{CacheEntry, CacheStore, FieldMap, IndexDefinition, StateError, TagQuery};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory cache backend
///
/// Hashes are kept in a `HashMap`; searches scan the keys under the index
/// prefix and compare the raw TAG value. Results are ordered by key.
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheStore {
    store: Arc<RwLock<HashMap<String, FieldMap>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fields of the hash at `key`, if present
    pub async fn get(&self, key: &str) -> Option<FieldMap> {
        self.store.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn search(
        &self,
        index: &IndexDefinition,
        query: &TagQuery,
        limit: usize,
    ) -> Result<Vec<CacheEntry>, StateError> {
        if !index.tag_fields.contains(&query.field) {
            return Err(StateError::InvalidInput(format!(
                "{} is not a TAG field of {}",
                query.field, index.name
            )));
        }

        let store = self.store.read().await;
        let mut hits: Vec<CacheEntry> = store
            .iter()
            .filter(|(key, fields)| key.starts_with(index.prefix) && query.matches(fields))
            .map(|(key, fields)| CacheEntry {
                key: key.clone(),
                fields: fields.clone(),
            })
            .collect();

        hits.sort_by(|a, b| a.key.cmp(&b.key));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn hset(&self, key: &str, fields: &FieldMap) -> Result<(), StateError> {
        let mut store = self.store.write().await;
        let entry = store.entry(key.to_string()).or_default();
        for (field, value) in fields {
            entry.insert(field.clone(), value.clone());
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StateError> {
        self.store.write().await.remove(key);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StateError> {
        Ok(())
    }
}
