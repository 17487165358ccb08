//! Namespace-scoped connection pooling for a record store and a cache store.
//!
//! # Architecture Overview
//!
//! ```text
//!   config file ──▶ config::source ◀── registry (seed lists)
//!                        │
//!                        ▼
//!                 config::resolver ── EffectiveConfig per namespace
//!                        │
//!                        ▼
//!                 pool::manager ── one pool per (namespace, role)
//!                        │
//!                        ▼
//!             ConnectionProvider::with_connection(namespace, role, f)
//! ```
//!
//! Cross-cutting: `observability` (tracing, metrics), `resilience`
//! (connect backoff), `lifecycle` (startup, reload, shutdown).

pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod pool;
pub mod registry;
pub mod resilience;

pub use config::{ConfigError, ConfigMode, ConfigResolver, ConfigSource, EffectiveConfig, Settings};
pub use lifecycle::Shutdown;
pub use pool::{
    Connection, ConnectionFactory, ConnectionPoolManager, ConnectionProvider, Lookup,
    NamespaceHandle, PoolError, PoolRole,
};
