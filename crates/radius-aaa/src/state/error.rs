//! Error types for cache backend operations

use std::fmt;

/// Errors that can occur while talking to the cache
#[derive(Debug)]
pub enum StateError {
    /// Connection error (Valkey unreachable)
    ConnectionError(String),

    /// Command timeout
    Timeout(String),

    /// Reply could not be interpreted
    SerializationError(String),

    /// Invalid key or value
    InvalidInput(String),

    /// Backend-specific error
    BackendError(String),

    /// Configuration error
    ConfigError(String),
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::ConnectionError(msg) => write!(f, "Connection error: {}", msg),
            StateError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            StateError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            StateError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            StateError::BackendError(msg) => write!(f, "Backend error: {}", msg),
            StateError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for StateError {}

impl From<redis::RedisError> for StateError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_connection_dropped() {
            StateError::ConnectionError(format!("Valkey connection error: {}", err))
        } else if err.is_timeout() {
            StateError::Timeout(format!("Valkey timeout: {}", err))
        } else {
            StateError::BackendError(format!("Valkey error: {}", err))
        }
    }
}
