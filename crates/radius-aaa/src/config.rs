use crate::state::ValkeyConfig;
use crate::store::PostgresConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Admin HTTP surface (`/health`, `/metrics`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Bind address, e.g. "127.0.0.1:9090"
    pub listen: String,
    /// Required in the `X-API-Key` header of `/metrics`
    pub api_key: String,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address all three RADIUS listeners bind to
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    #[serde(default = "default_access_port")]
    pub access_port: u16,

    #[serde(default = "default_accounting_port")]
    pub accounting_port: u16,

    /// CoA / Disconnect port (RFC 5176)
    #[serde(default = "default_coa_port")]
    pub coa_port: u16,

    /// Log level: "trace", "debug", "info", "warn", "error" (default: "info")
    #[serde(default)]
    pub log_level: Option<String>,

    pub database: PostgresConfig,

    #[serde(default)]
    pub valkey: ValkeyConfig,

    #[serde(default)]
    pub admin: Option<AdminConfig>,
}

fn default_listen_address() -> String {
    "0.0.0.0".to_string()
}

fn default_access_port() -> u16 {
    1812
}

fn default_accounting_port() -> u16 {
    1813
}

fn default_coa_port() -> u16 {
    3799
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_address: default_listen_address(),
            access_port: default_access_port(),
            accounting_port: default_accounting_port(),
            coa_port: default_coa_port(),
            log_level: None,
            database: PostgresConfig::default(),
            valkey: ValkeyConfig::default(),
            admin: None,
        }
    }
}

impl Config {
    /// Load and validate configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Socket address of one listener
    pub fn socket_addr(&self, port: u16) -> Result<SocketAddr, ConfigError> {
        let addr: IpAddr = self.listen_address.parse().map_err(|_| {
            ConfigError::Invalid(format!("Invalid IP address: {}", self.listen_address))
        })?;
        Ok(SocketAddr::new(addr, port))
    }

    pub fn admin_addr(&self) -> Result<Option<SocketAddr>, ConfigError> {
        self.admin
            .as_ref()
            .map(|admin| {
                admin.listen.parse().map_err(|_| {
                    ConfigError::Invalid(format!("Invalid admin listen address: {}", admin.listen))
                })
            })
            .transpose()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let _: IpAddr = self.listen_address.parse().map_err(|_| {
            ConfigError::Invalid(format!("Invalid listen address: {}", self.listen_address))
        })?;

        let ports = [
            ("access", self.access_port),
            ("accounting", self.accounting_port),
            ("coa", self.coa_port),
        ];
        for (name, port) in ports {
            if port == 0 {
                return Err(ConfigError::Invalid(format!("{} port cannot be 0", name)));
            }
        }
        if self.access_port == self.accounting_port
            || self.access_port == self.coa_port
            || self.accounting_port == self.coa_port
        {
            return Err(ConfigError::Invalid(
                "access, accounting and coa ports must be distinct".to_string(),
            ));
        }

        if self.database.url.is_empty() {
            return Err(ConfigError::Invalid("Database URL cannot be empty".to_string()));
        }
        if self.valkey.url.is_empty() {
            return Err(ConfigError::Invalid("Valkey URL cannot be empty".to_string()));
        }

        if let Some(admin) = &self.admin {
            if admin.api_key.is_empty() {
                return Err(ConfigError::Invalid("Admin API key cannot be empty".to_string()));
            }
            self.admin_addr()?;
        }

        Ok(())
    }

    /// Create an example configuration file
    pub fn example() -> Self {
        Config {
            log_level: Some("info".to_string()),
            admin: Some(AdminConfig {
                listen: "127.0.0.1:9090".to_string(),
                api_key: "change-me".to_string(),
            }),
            ..Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.access_port, 1812);
        assert_eq!(config.accounting_port, 1813);
        assert_eq!(config.coa_port, 3799);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_example_is_valid() {
        assert!(Config::example().validate().is_ok());
    }

    #[test]
    fn test_zero_port_rejected() {
        let mut config = Config::default();
        config.coa_port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_port_collision_rejected() {
        let mut config = Config::default();
        config.coa_port = config.access_port;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_admin_key_rejected() {
        let mut config = Config::example();
        if let Some(admin) = config.admin.as_mut() {
            admin.api_key.clear();
        }
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_listen_address() {
        let mut config = Config::default();
        config.listen_address = "not-an-ip".to_string();
        assert!(config.validate().is_err());
        assert!(config.socket_addr(1812).is_err());
    }

    #[test]
    fn test_minimal_json() {
        let json = r#"{"database": {"url": "postgresql://radius@db/radius"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.valkey.url, "redis://localhost:6379");
        assert_eq!(config.coa_port, 3799);
        assert!(config.admin.is_none());
    }

    #[test]
    fn test_file_round_trip() {
        let path = std::env::temp_dir().join(format!("radius-aaa-config-{}.json", std::process::id()));
        Config::example().to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.admin.unwrap().listen, "127.0.0.1:9090");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_socket_addr() {
        let config = Config::default();
        let addr = config.socket_addr(config.accounting_port).unwrap();
        assert_eq!(addr.port(), 1813);
    }
}
