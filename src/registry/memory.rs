//! In-process registry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::registry::{RegistryConnector, RegistryError, RegistrySession};

/// A thread-safe path → value map that acts as both connector and session.
///
/// Clones share the same entries, so a handle kept by the embedding
/// application can publish new seed lists before a reload.
#[derive(Debug, Clone)]
pub struct MemoryRegistry {
    entries: Arc<DashMap<String, Vec<u8>>>,
    reachable: Arc<AtomicBool>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            reachable: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Store a value at `path`.
    pub fn insert(&self, path: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.entries.insert(path.into(), value.into());
    }

    pub fn remove(&self, path: &str) {
        self.entries.remove(path);
    }

    /// Simulate the registry going away (or coming back).
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryConnector for MemoryRegistry {
    type Session = MemoryRegistry;

    async fn connect(&self, address: &str) -> Result<MemoryRegistry, RegistryError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(RegistryError::Unavailable {
                address: address.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(self.clone())
    }
}

impl RegistrySession for MemoryRegistry {
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, RegistryError> {
        Ok(self.entries.get(path).map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_and_missing() {
        let registry = MemoryRegistry::new();
        registry.insert("/seeds/users", "10.0.0.1:3000");

        let session = registry.connect("127.0.0.1:2181").await.unwrap();
        assert_eq!(session.get("/seeds/users").await.unwrap(), Some(b"10.0.0.1:3000".to_vec()));
        assert_eq!(session.get("/seeds/other").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unreachable() {
        let registry = MemoryRegistry::new();
        registry.set_reachable(false);
        let err = registry.connect("127.0.0.1:2181").await.unwrap_err();
        assert!(matches!(err, RegistryError::Unavailable { .. }));
    }
}
