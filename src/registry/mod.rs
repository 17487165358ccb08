//! Coordination registry access.
//!
//! # Data Flow
//! ```text
//! config file (namespaces.<name>.zk_path)
//!     → RegistryConnector::connect(registry_address)
//!     → RegistrySession::get(zk_path) per namespace
//!     → config::seed (validate seed list)
//!     → namespace host override
//! ```
//!
//! # Design Decisions
//! - Connect failure means the whole registry is unavailable; the caller
//!   falls back to the static file
//! - A missing or unreadable path only affects its own namespace
//! - Clients are pluggable through [`RegistryConnector`]; the crate ships an
//!   in-memory registry and a directory-backed one

pub mod directory;
pub mod memory;

use std::convert::Infallible;
use std::future::Future;

pub use directory::DirectoryRegistry;
pub use memory::MemoryRegistry;

/// Registry failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("registry at {address} is unavailable: {reason}")]
    Unavailable { address: String, reason: String },

    #[error("failed to read registry path {path}: {reason}")]
    Read { path: String, reason: String },
}

/// An open registry connection.
pub trait RegistrySession: Send + Sync {
    /// Value stored at `path`, or `None` when the path does not exist.
    fn get(&self, path: &str) -> impl Future<Output = Result<Option<Vec<u8>>, RegistryError>> + Send;
}

/// Opens sessions against a registry address.
pub trait RegistryConnector: Send + Sync {
    type Session: RegistrySession;

    fn connect(&self, address: &str) -> impl Future<Output = Result<Self::Session, RegistryError>> + Send;
}

/// Connector for deployments without a registry. Always unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRegistry;

impl RegistryConnector for NoRegistry {
    type Session = Infallible;

    async fn connect(&self, address: &str) -> Result<Infallible, RegistryError> {
        Err(RegistryError::Unavailable {
            address: address.to_string(),
            reason: "no registry client configured".to_string(),
        })
    }
}

impl RegistrySession for Infallible {
    async fn get(&self, _path: &str) -> Result<Option<Vec<u8>>, RegistryError> {
        match *self {}
    }
}
