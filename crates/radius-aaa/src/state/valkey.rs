//! Valkey cache backend using the RediSearch module

use super::config::ValkeyConfig;
use super::{CacheEntry, CacheStore, FieldMap, IndexDefinition, StateError, TagQuery};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError, Value};
use tracing::{debug, info};

/// Valkey cache backend
///
/// Hashes are written with `HSET` and found with `FT.SEARCH`, so the server
/// needs the search module loaded. `ensure_indexes` creates the two indexes
/// at startup.
///
/// # Example
///
/// ```no_run
/// use radius_aaa::state::{ValkeyCacheStore, ValkeyConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let cache = ValkeyCacheStore::new(ValkeyConfig::new("redis://localhost:6379")).await?;
/// cache.ensure_indexes().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ValkeyCacheStore {
    conn: ConnectionManager,
    config: ValkeyConfig,
}

impl ValkeyCacheStore {
    /// Connect to Valkey
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the server is unreachable.
    pub async fn new(config: ValkeyConfig) -> Result<Self, StateError> {
        let client = Client::open(config.url.clone())
            .map_err(|e| StateError::ConfigError(format!("Invalid Valkey URL: {}", e)))?;

        let conn = ConnectionManager::new(client).await.map_err(|e| {
            StateError::ConnectionError(format!("Failed to connect to Valkey: {}", e))
        })?;

        Ok(Self { conn, config })
    }

    fn prefixed_key(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }

    fn unprefixed_key(&self, key: &str) -> String {
        key.strip_prefix(&self.config.key_prefix)
            .unwrap_or(key)
            .to_string()
    }

    /// Execute a command with retry logic
    async fn with_retry<F, T>(&self, mut f: F) -> Result<T, StateError>
    where
        F: FnMut() -> std::pin::Pin<
            Box<dyn std::future::Future<Output = Result<T, RedisError>> + Send>,
        >,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match f().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    debug!(attempt, error = %e, "Valkey command failed");
                    last_error = Some(e);

                    if attempt < self.config.max_retries {
                        tokio::time::sleep(self.config.retry_delay()).await;
                    }
                }
            }
        }

        Err(last_error
            .map(StateError::from)
            .unwrap_or_else(|| StateError::BackendError("command not attempted".to_string())))
    }

    /// Create the NAS and subscriber indexes if they do not exist yet
    pub async fn ensure_indexes(&self) -> Result<(), StateError> {
        for index in [super::NAS_INDEX, super::SUBSCRIBER_INDEX] {
            self.create_index(&index).await?;
        }
        Ok(())
    }

    async fn create_index(&self, index: &IndexDefinition) -> Result<(), StateError> {
        let mut cmd = redis::cmd("FT.CREATE");
        cmd.arg(index.name)
            .arg("ON")
            .arg("HASH")
            .arg("PREFIX")
            .arg(1)
            .arg(self.prefixed_key(index.prefix))
            .arg("SCHEMA")
            .arg(index.schema_args());

        let mut conn = self.conn.clone();
        let result: Result<(), RedisError> = cmd.query_async(&mut conn).await;
        match result {
            Ok(()) => {
                info!(index = index.name, "Created cache index");
                Ok(())
            }
            Err(e) if e.to_string().contains("Index already exists") => {
                debug!(index = index.name, "Cache index already exists");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl CacheStore for ValkeyCacheStore {
    async fn search(
        &self,
        index: &IndexDefinition,
        query: &TagQuery,
        limit: usize,
    ) -> Result<Vec<CacheEntry>, StateError> {
        let rendered = query.to_string();
        let index_name = index.name;
        let conn = self.conn.clone();

        let reply: Value = self
            .with_retry(|| {
                let rendered = rendered.clone();
                let mut conn = conn.clone();
                Box::pin(async move {
                    redis::cmd("FT.SEARCH")
                        .arg(index_name)
                        .arg(&rendered)
                        .arg("LIMIT")
                        .arg(0)
                        .arg(limit)
                        .query_async(&mut conn)
                        .await
                })
            })
            .await?;

        let mut entries = parse_search_reply(reply)?;
        for entry in &mut entries {
            entry.key = self.unprefixed_key(&entry.key);
        }
        Ok(entries)
    }

    async fn hset(&self, key: &str, fields: &FieldMap) -> Result<(), StateError> {
        if fields.is_empty() {
            return Err(StateError::InvalidInput(format!(
                "HSET {} with no fields",
                key
            )));
        }

        let prefixed_key = self.prefixed_key(key);
        let items: Vec<(String, String)> = fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let conn = self.conn.clone();

        self.with_retry(|| {
            let prefixed_key = prefixed_key.clone();
            let items = items.clone();
            let mut conn = conn.clone();
            Box::pin(async move { conn.hset_multiple(&prefixed_key, &items).await })
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), StateError> {
        let prefixed_key = self.prefixed_key(key);
        let conn = self.conn.clone();

        self.with_retry(|| {
            let prefixed_key = prefixed_key.clone();
            let mut conn = conn.clone();
            Box::pin(async move { conn.del(&prefixed_key).await })
        })
        .await
    }

    async fn ping(&self) -> Result<(), StateError> {
        let conn = self.conn.clone();

        self.with_retry(|| {
            let mut conn = conn.clone();
            Box::pin(async move { redis::cmd("PING").query_async(&mut conn).await })
        })
        .await
    }
}

impl std::fmt::Debug for ValkeyCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValkeyCacheStore")
            .field("url", &self.config.url)
            .field("key_prefix", &self.config.key_prefix)
            .finish()
    }
}

/// Decode an `FT.SEARCH` reply: `[total, key, [field, value, ...], key, ...]`
fn parse_search_reply(reply: Value) -> Result<Vec<CacheEntry>, StateError> {
    let items = match reply {
        Value::Array(items) => items,
        other => {
            return Err(StateError::SerializationError(format!(
                "unexpected FT.SEARCH reply: {:?}",
                other
            )));
        }
    };

    let mut entries = Vec::new();
    // First element is the total match count, not a hit
    let mut rest = items.into_iter().skip(1);
    while let Some(key) = rest.next() {
        let key: String = redis::from_redis_value(&key)
            .map_err(|e| StateError::SerializationError(format!("invalid key: {}", e)))?;
        let pairs = match rest.next() {
            Some(Value::Array(pairs)) => pairs,
            _ => {
                return Err(StateError::SerializationError(format!(
                    "missing fields for {}",
                    key
                )));
            }
        };

        let mut fields = FieldMap::new();
        for pair in pairs.chunks(2) {
            if let [name, value] = pair {
                let name: String = redis::from_redis_value(name).map_err(|e| {
                    StateError::SerializationError(format!("invalid field name: {}", e))
                })?;
                let value: String = redis::from_redis_value(value).map_err(|e| {
                    StateError::SerializationError(format!("invalid field value: {}", e))
                })?;
                fields.insert(name, value);
            }
        }
        entries.push(CacheEntry { key, fields });
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{NAS_INDEX, SUBSCRIBER_INDEX};

    fn bulk(s: &str) -> Value {
        Value::BulkString(s.as_bytes().to_vec())
    }

    #[test]
    fn test_parse_search_reply() {
        let reply = Value::Array(vec![
            Value::Int(1),
            bulk("radius_nas:3"),
            Value::Array(vec![
                bulk("ip_address"),
                bulk("10.1.1.1"),
                bulk("secret"),
                bulk("s3cr3t"),
            ]),
        ]);

        let entries = parse_search_reply(reply).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "radius_nas:3");
        assert_eq!(entries[0].fields.get("secret").unwrap(), "s3cr3t");
    }

    #[test]
    fn test_parse_empty_reply() {
        let entries = parse_search_reply(Value::Array(vec![Value::Int(0)])).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_parse_rejects_non_array() {
        assert!(parse_search_reply(Value::Nil).is_err());
        let truncated = Value::Array(vec![Value::Int(1), bulk("subscriber:10.0.0.1")]);
        assert!(parse_search_reply(truncated).is_err());
    }

    // These tests require a running Valkey instance with the search module
    // Run with: docker run -d -p 6379:6379 valkey/valkey-bundle:latest

    async fn create_test_store() -> ValkeyCacheStore {
        let config = ValkeyConfig {
            key_prefix: "test:".to_string(),
            ..ValkeyConfig::new("redis://localhost:6379")
        };
        let store = ValkeyCacheStore::new(config).await.unwrap();
        store.ensure_indexes().await.unwrap();
        store
    }

    #[tokio::test]
    #[ignore] // Requires Valkey server
    async fn test_connection() {
        let store = create_test_store().await;
        store.ping().await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Valkey server
    async fn test_hset_search_delete() {
        let store = create_test_store().await;
        let mut fields = FieldMap::new();
        fields.insert("ip".to_string(), "10.9.9.9".to_string());
        fields.insert("session_id".to_string(), "sess-9".to_string());
        fields.insert("subscriber_id".to_string(), "sub-9".to_string());
        store.hset("subscriber:10.9.9.9", &fields).await.unwrap();

        let hits = store
            .search(&SUBSCRIBER_INDEX, &TagQuery::new("ip", "10.9.9.9"), 1)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key, "subscriber:10.9.9.9");

        store.delete("subscriber:10.9.9.9").await.unwrap();
        let hits = store
            .search(&NAS_INDEX, &TagQuery::new("ip_address", "10.9.9.9"), 1)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    #[ignore] // Requires Valkey server
    async fn test_tags_are_exact() {
        let store = create_test_store().await;
        let mut fields = FieldMap::new();
        fields.insert("ip".to_string(), "10.9.9.8".to_string());
        fields.insert("session_id".to_string(), "sess,8".to_string());
        fields.insert("subscriber_id".to_string(), "Sub-8".to_string());
        store.hset("subscriber:10.9.9.8", &fields).await.unwrap();

        let folded = store
            .search(&SUBSCRIBER_INDEX, &TagQuery::new("subscriber_id", "sub-8"), 10)
            .await
            .unwrap();
        assert!(folded.is_empty());

        let with_comma = store
            .search(&SUBSCRIBER_INDEX, &TagQuery::new("session_id", "sess,8"), 10)
            .await
            .unwrap();
        assert_eq!(with_comma.len(), 1);

        store.delete("subscriber:10.9.9.8").await.unwrap();
    }
}
