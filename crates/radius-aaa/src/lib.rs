//! RADIUS AAA Server
//!
//! This crate implements an Access, Accounting and CoA server on top of
//! the `radius-proto` codec.
//!
//! # Features
//!
//! - Per-NAS shared secrets looked up cache-aside (Valkey search index over PostgreSQL)
//! - PAP authentication against bcrypt hashes
//! - Accounting session tracking keyed by framed IP, with roaming and stale-record cleanup
//! - CoA / Disconnect acknowledgement
//! - Response time aggregation exposed in Prometheus format
//!
//! # Example
//!
//! ```rust,no_run
//! use radius_aaa::{
//!     AccessHandler, AccountingHandler, CoaHandler, Config, Handlers, ListenerMultiplexer,
//!     MemoryCacheStore, MemoryStore, MetricsAggregator, SecretResolver, SessionTracker,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cache = Arc::new(MemoryCacheStore::new());
//!     let store = Arc::new(MemoryStore::new());
//!     let metrics = Arc::new(MetricsAggregator::new());
//!
//!     let handlers = Handlers {
//!         access: Arc::new(AccessHandler::new(store.clone(), metrics.clone())),
//!         accounting: Arc::new(AccountingHandler::new(
//!             Arc::new(SessionTracker::new(cache.clone())),
//!             metrics.clone(),
//!         )),
//!         coa: Arc::new(CoaHandler::new(metrics)),
//!     };
//!
//!     let resolver = Arc::new(SecretResolver::new(cache, store));
//!     let server = ListenerMultiplexer::bind(&Config::default(), resolver, handlers).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod access;
pub mod accounting;
pub mod admin;
pub mod coa;
pub mod config;
pub mod error;
pub mod listener;
pub mod metrics;
pub mod nas;
pub mod resolver;
pub mod state;
pub mod store;
pub mod subscriber;

pub use access::AccessHandler;
pub use accounting::{AccountingEvent, AccountingHandler, SessionTracker, StopOutcome};
pub use admin::{AdminState, create_admin_router, start_admin_server};
pub use coa::CoaHandler;
pub use config::{AdminConfig, Config, ConfigError};
pub use error::AaaError;
pub use listener::{
    Handlers, ListenerKind, ListenerMultiplexer, PacketHandler, RadiusListener, RadiusRequest,
    ServerError,
};
pub use metrics::{MetricsAggregator, RequestStatus, RequestType};
pub use nas::{AvpConfig, AvpSetting, NasRecord};
pub use resolver::{ResolveError, ResolvedNas, SecretResolver};
pub use state::{CacheStore, MemoryCacheStore, StateError, ValkeyCacheStore, ValkeyConfig};
pub use store::{Credential, MemoryStore, NasStore, PostgresConfig, PostgresStore, StoreError};
pub use subscriber::{IpVersion, SubscriberSession};
