//! Pool errors.

use std::time::Duration;

use crate::pool::key::PoolKey;

/// Errors surfaced by pool construction and checkout.
///
/// `Clone` so that one construction failure can be handed to every caller
/// that was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// The store could not be reached after all connect attempts.
    #[error("failed to connect pool {key}: {reason}")]
    Connection { key: PoolKey, reason: String },

    /// No connection became available within the pool timeout.
    #[error("timed out after {waited:?} waiting for a connection from pool {key}")]
    Timeout { key: PoolKey, waited: Duration },

    /// The pool was shut down.
    #[error("pool {key} is closed")]
    Closed { key: PoolKey },
}

impl PoolError {
    pub fn key(&self) -> &PoolKey {
        match self {
            PoolError::Connection { key, .. }
            | PoolError::Timeout { key, .. }
            | PoolError::Closed { key } => key,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, PoolError::Timeout { .. })
    }
}
