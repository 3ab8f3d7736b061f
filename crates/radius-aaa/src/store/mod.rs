//! Persistent NAS directory and credential store

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::{PostgresConfig, PostgresStore};

use crate::nas::NasRecord;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database connection error: {0}")]
    Connection(String),
    #[error("Database query error: {0}")]
    Query(String),
}

/// A user's stored credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    /// bcrypt hash
    pub password_hash: String,
}

/// Authoritative source of NAS records and user credentials.
///
/// `Ok(None)` means the row does not exist; `Err` is reserved for I/O
/// failures so callers can tell "unknown" from "unreachable".
#[async_trait]
pub trait NasStore: Send + Sync {
    async fn get_nas_by_ip(&self, ip: &str) -> Result<Option<NasRecord>, StoreError>;

    async fn get_user_by_username(&self, username: &str)
    -> Result<Option<Credential>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
