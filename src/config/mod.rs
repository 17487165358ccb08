//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, one table per environment)
//!     → loader.rs (interpolate ${VAR}, pick environment, deserialize)
//!     → source.rs (optionally overlay registry seed lists via seed.rs)
//!     → raw.rs (apply store defaults)
//!     → validation.rs (semantic checks)
//!     → Settings (validated, immutable)
//!     → resolver.rs (EffectiveConfig per namespace)
//!
//! On reload signal:
//!     watcher.rs detects change
//!     → source.rs loads new settings
//!     → pool manager swaps its resolver
//! ```
//!
//! # Design Decisions
//! - Settings are immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - A namespace override only replaces the fields it sets

pub mod loader;
pub mod raw;
pub mod resolver;
pub mod schema;
pub mod seed;
pub mod source;
pub mod validation;
pub mod watcher;

pub use loader::ConfigError;
pub use resolver::{ConfigResolver, EffectiveConfig};
pub use schema::{
    ConfigProvenance, GlobalConfig, HostEndpoint, NamespaceOverride, ObservabilityConfig,
    PoolConfig, Secret, SessionConfig, Settings, StoreKind, TimeoutConfig, UrlCredentials,
};
pub use seed::parse_seed_list;
pub use source::{ConfigMode, ConfigSource};
pub use watcher::{ConfigChange, ConfigWatcher};
