//! Domain error taxonomy shared by the accounting and access paths

use crate::state::StateError;
use crate::store::StoreError;
use thiserror::Error;

/// Errors raised while processing a single RADIUS request.
///
/// None of these terminate a listener: the packet boundary logs them and
/// either drops the datagram (accounting) or answers with a Reject (access).
#[derive(Error, Debug)]
pub enum AaaError {
    /// Per-NAS configuration is missing or malformed
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unknown NAS, user, subscriber, session or absent attribute
    #[error("Not found: {0}")]
    NotFound(String),

    /// A required field is missing or empty
    #[error("Validation error: {0}")]
    Validation(String),

    /// Cache I/O failure
    #[error("Transient cache error: {0}")]
    Cache(#[from] StateError),

    /// Persistent store I/O failure
    #[error("Transient store error: {0}")]
    Store(#[from] StoreError),
}

impl AaaError {
    /// Whether this is a transient store/cache failure rather than a
    /// property of the request itself
    pub fn is_transient(&self) -> bool {
        matches!(self, AaaError::Cache(_) | AaaError::Store(_))
    }
}
