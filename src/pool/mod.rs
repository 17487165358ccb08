//! Connection pooling subsystem.
//!
//! # Data Flow
//! ```text
//! with_connection(namespace, role, f)
//!     → manager.rs (normalize role, find or build the pool)
//!         first access: resolver → EffectiveConfig → bounded.rs connect
//!     → bounded.rs (permit within pool_timeout, idle or new connection)
//!     → f(&mut connection)
//!     → PooledConnection drop (return to idle, or close if broken)
//! ```
//!
//! # Design Decisions
//! - One pool per (namespace, role); the record store only has `default`
//! - The manager is an explicit value, not a process-wide singleton
//! - Store clients plug in through [`ConnectionFactory`]

pub mod bounded;
pub mod connection;
pub mod error;
pub mod key;
pub mod manager;
pub mod provider;

pub use bounded::{ConnectionPool, PoolStats, PooledConnection};
pub use connection::{BoxError, Connection, ConnectionFactory};
pub use error::PoolError;
pub use key::{PoolKey, PoolRole};
pub use manager::ConnectionPoolManager;
pub use provider::{ConnectionProvider, Lookup, NamespaceHandle};
