//! Filesystem-backed registry.
//!
//! The registry address is a directory; each registry path maps onto a file
//! below it (`/seeds/users` → `<root>/seeds/users`). This fits deployments
//! that mirror registry nodes into a mounted volume.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::registry::{RegistryConnector, RegistryError, RegistrySession};

/// Connector that treats the registry address as a root directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryRegistry;

/// Session rooted at one directory.
#[derive(Debug, Clone)]
pub struct DirectorySession {
    root: PathBuf,
}

impl DirectorySession {
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, RegistryError> {
        let relative = Path::new(path.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || relative.as_os_str().is_empty() {
            return Err(RegistryError::Read {
                path: path.to_string(),
                reason: "path must stay inside the registry root".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

impl RegistryConnector for DirectoryRegistry {
    type Session = DirectorySession;

    async fn connect(&self, address: &str) -> Result<DirectorySession, RegistryError> {
        let root = PathBuf::from(address);
        match tokio::fs::metadata(&root).await {
            Ok(meta) if meta.is_dir() => Ok(DirectorySession { root }),
            Ok(_) => Err(RegistryError::Unavailable {
                address: address.to_string(),
                reason: "not a directory".to_string(),
            }),
            Err(e) => Err(RegistryError::Unavailable {
                address: address.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

impl RegistrySession for DirectorySession {
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, RegistryError> {
        let file = self.resolve(path)?;
        match tokio::fs::read(&file).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RegistryError::Read {
                path: path.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}
