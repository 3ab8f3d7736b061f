//! Shared-secret resolution for inbound packets
//!
//! Every datagram is authenticated with the secret of the NAS it came from.
//! Lookups go to the cache first and fall back to the persistent store,
//! writing the record back so the next packet from that NAS is a cache hit.

use crate::nas::{AvpConfig, NasRecord};
use crate::state::{CacheStore, NAS_INDEX, TagQuery};
use crate::store::{NasStore, StoreError};
use std::net::IpAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ResolveError {
    /// Neither the cache nor the store knows this IP
    #[error("Unknown NAS: {0}")]
    NotFound(String),

    /// The store could not be queried
    #[error("NAS lookup failed: {0}")]
    Transient(#[from] StoreError),
}

/// What a listener needs to know about the NAS behind a packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNas {
    pub id: i64,
    pub name: Option<String>,
    pub ip_address: String,
    pub secret: String,
    pub avp: AvpConfig,
}

impl From<NasRecord> for ResolvedNas {
    fn from(record: NasRecord) -> Self {
        ResolvedNas {
            id: record.id,
            name: record.name,
            ip_address: record.ip_address,
            secret: record.secret,
            avp: record.avp,
        }
    }
}

/// Cache-aside lookup of NAS secrets by peer IP
pub struct SecretResolver {
    cache: Arc<dyn CacheStore>,
    store: Arc<dyn NasStore>,
}

impl SecretResolver {
    pub fn new(cache: Arc<dyn CacheStore>, store: Arc<dyn NasStore>) -> Self {
        Self { cache, store }
    }

    pub async fn resolve(&self, peer: IpAddr) -> Result<ResolvedNas, ResolveError> {
        let ip = peer.to_canonical().to_string();

        if let Some(record) = self.lookup_cache(&ip).await {
            debug!(nas_ip = %ip, nas_id = record.id, "NAS resolved from cache");
            return Ok(record.into());
        }

        let record = match self.store.get_nas_by_ip(&ip).await? {
            Some(record) => record,
            None => return Err(ResolveError::NotFound(ip)),
        };

        if let Err(e) = self.cache.hset(&record.cache_key(), &record.to_fields()).await {
            warn!(nas_ip = %ip, error = %e, "Failed to cache NAS record");
        }

        debug!(nas_ip = %ip, nas_id = record.id, "NAS resolved from database");
        Ok(record.into())
    }

    /// Cache errors and malformed entries count as a miss
    async fn lookup_cache(&self, ip: &str) -> Option<NasRecord> {
        let query = TagQuery::new("ip_address", ip);
        let hits = match self.cache.search(&NAS_INDEX, &query, 1).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(nas_ip = %ip, error = %e, "NAS cache lookup failed, falling back to database");
                return None;
            }
        };

        let entry = hits.into_iter().find(|hit| query.matches(&hit.fields))?;
        let record = NasRecord::from_fields(&entry.fields);
        if record.is_none() {
            warn!(nas_ip = %ip, key = %entry.key, "Ignoring incomplete cached NAS record");
        }
        record
    }
}
