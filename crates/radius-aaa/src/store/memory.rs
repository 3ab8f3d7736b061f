//! In-memory store for tests and local development

use super::{Credential, NasStore, StoreError};
use crate::nas::NasRecord;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// NAS records keyed by IP and credentials keyed by username
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    nas: Arc<DashMap<String, NasRecord>>,
    users: Arc<DashMap<String, Credential>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_nas(&self, record: NasRecord) {
        self.nas.insert(record.ip_address.clone(), record);
    }

    /// Store a user with an already-hashed password
    pub fn add_user(&self, username: impl Into<String>, password_hash: impl Into<String>) {
        let username = username.into();
        self.users.insert(
            username.clone(),
            Credential {
                username,
                password_hash: password_hash.into(),
            },
        );
    }
}

#[async_trait]
impl NasStore for MemoryStore {
    async fn get_nas_by_ip(&self, ip: &str) -> Result<Option<NasRecord>, StoreError> {
        Ok(self.nas.get(ip).map(|entry| entry.value().clone()))
    }

    async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Credential>, StoreError> {
        Ok(self.users.get(username).map(|entry| entry.value().clone()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
