//! Cache connection configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Valkey connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValkeyConfig {
    /// Connection URL (e.g., "redis://localhost:6379")
    /// Supports:
    /// - redis://host:port (TCP)
    /// - redis://host:port/db (TCP with database selection)
    /// - rediss://host:port (TLS)
    pub url: String,

    /// Prefix prepended to every key, and to the index PREFIX clauses
    #[serde(default)]
    pub key_prefix: String,

    /// Maximum number of retries for failed commands (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Retry delay in milliseconds (default: 100)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    100
}

impl Default for ValkeyConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            key_prefix: String::new(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl ValkeyConfig {
    /// Create a new Valkey configuration with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
