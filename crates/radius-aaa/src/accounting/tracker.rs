//! Subscriber session lifecycle driven by accounting events
//!
//! | Current            | Event               | Next               | Side effect            |
//! |--------------------|---------------------|--------------------|------------------------|
//! | no session         | Start(ip)           | active at ip       | create record at ip    |
//! | no session         | InterimUpdate(ip)   | active at ip       | create record at ip    |
//! | active at ip       | InterimUpdate(ip)   | active at ip       | refresh timestamp      |
//! | active at ip1      | InterimUpdate(ip2)  | active at ip2      | delete ip1, create ip2 |
//! | active at ip       | Stop(ip)            | no session         | delete record          |
//! | no session         | Stop(any)           | no session         | nothing                |
//!
//! Packets for the same subscriber may be processed concurrently and in any
//! order. There is no per-subscriber lock; the last write wins.

use crate::error::AaaError;
use crate::state::{CacheStore, SUBSCRIBER_INDEX, TagQuery};
use crate::subscriber::{IpVersion, SubscriberSession};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Upper bound on records returned for one subscriber
const MAX_SESSIONS_PER_SUBSCRIBER: usize = 100;

/// How a Stop was resolved against the current records
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// The record at the stopped IP was deleted
    Removed(SubscriberSession),
    /// The subscriber has no records
    NoSession,
    /// The subscriber has records, none at the stopped IP
    Unmatched,
}

pub struct SessionTracker {
    cache: Arc<dyn CacheStore>,
}

impl SessionTracker {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self { cache }
    }

    /// Begin a session at `ip`.
    ///
    /// A Start for a subscriber that already has records is tolerated and
    /// upserts the record at `ip`, leaving records at other IPs untouched.
    ///
    /// An empty `ip` is a validation error whether or not the subscriber
    /// already has records: a record cannot be keyed without an address.
    pub async fn start(
        &self,
        subscriber_id: &str,
        session_id: &str,
        ip: &str,
        ip_version: Option<IpVersion>,
    ) -> Result<SubscriberSession, AaaError> {
        require_ip(ip, subscriber_id)?;
        let existing = self.sessions_for_subscriber(subscriber_id).await?;

        if existing.is_empty() {
            // Whoever held this IP before is gone
            self.cache.delete(&SubscriberSession::key_for(ip)).await?;
        } else {
            info!(
                subscriber_id = %subscriber_id,
                existing_count = existing.len(),
                "Start for subscriber with existing sessions"
            );
        }

        self.write(subscriber_id, session_id, ip, ip_version).await
    }

    /// Refresh, create or move a session to `ip`
    pub async fn interim_update(
        &self,
        subscriber_id: &str,
        session_id: &str,
        ip: &str,
        ip_version: Option<IpVersion>,
    ) -> Result<SubscriberSession, AaaError> {
        require_ip(ip, subscriber_id)?;
        let existing = self.sessions_for_subscriber(subscriber_id).await?;

        if existing.is_empty() {
            info!(subscriber_id = %subscriber_id, "No session found, treating interim update as start");
            self.cache.delete(&SubscriberSession::key_for(ip)).await?;
        } else if existing.iter().any(|s| s.ip == ip) {
            debug!(subscriber_id = %subscriber_id, ip = %ip, "Refreshing session");
        } else {
            info!(
                subscriber_id = %subscriber_id,
                new_ip = %ip,
                old_count = existing.len(),
                "Subscriber moved to a new IP, replacing sessions"
            );
            for old in &existing {
                self.cache.delete(&old.cache_key()).await?;
            }
        }

        self.write(subscriber_id, session_id, ip, ip_version).await
    }

    /// End the session at `ip`. Always succeeds when nothing matches.
    pub async fn stop(&self, subscriber_id: &str, ip: &str) -> Result<StopOutcome, AaaError> {
        let existing = self.sessions_for_subscriber(subscriber_id).await?;
        if existing.is_empty() {
            debug!(subscriber_id = %subscriber_id, "Stop for subscriber without sessions");
            return Ok(StopOutcome::NoSession);
        }

        match existing.into_iter().find(|s| s.ip == ip) {
            Some(session) => {
                self.cache.delete(&session.cache_key()).await?;
                Ok(StopOutcome::Removed(session))
            }
            None => {
                warn!(subscriber_id = %subscriber_id, ip = %ip, "Unmatched accounting stop");
                Ok(StopOutcome::Unmatched)
            }
        }
    }

    pub async fn sessions_for_subscriber(
        &self,
        subscriber_id: &str,
    ) -> Result<Vec<SubscriberSession>, AaaError> {
        self.find(
            TagQuery::new("subscriber_id", subscriber_id),
            MAX_SESSIONS_PER_SUBSCRIBER,
        )
        .await
    }

    pub async fn session_at_ip(&self, ip: &str) -> Result<Option<SubscriberSession>, AaaError> {
        Ok(self.find(TagQuery::new("ip", ip), 1).await?.into_iter().next())
    }

    pub async fn session_by_session_id(
        &self,
        session_id: &str,
    ) -> Result<Option<SubscriberSession>, AaaError> {
        Ok(self
            .find(TagQuery::new("session_id", session_id), 1)
            .await?
            .into_iter()
            .next())
    }

    async fn find(&self, query: TagQuery, limit: usize) -> Result<Vec<SubscriberSession>, AaaError> {
        let hits = self.cache.search(&SUBSCRIBER_INDEX, &query, limit).await?;
        // The index is trusted to narrow, not to decide equality
        Ok(hits
            .iter()
            .filter(|hit| query.matches(&hit.fields))
            .map(|hit| SubscriberSession::from_fields(&hit.fields))
            .collect())
    }

    async fn write(
        &self,
        subscriber_id: &str,
        session_id: &str,
        ip: &str,
        ip_version: Option<IpVersion>,
    ) -> Result<SubscriberSession, AaaError> {
        let session = SubscriberSession {
            subscriber_id: subscriber_id.to_string(),
            ip: ip.to_string(),
            ip_version,
            session_id: session_id.to_string(),
            last_updated_time: unix_now(),
        };
        self.cache
            .hset(&session.cache_key(), &session.to_fields())
            .await?;
        Ok(session)
    }
}

fn require_ip(ip: &str, subscriber_id: &str) -> Result<(), AaaError> {
    if ip.is_empty() {
        return Err(AaaError::Validation(format!(
            "no framed IP for subscriber {}",
            subscriber_id
        )));
    }
    Ok(())
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
