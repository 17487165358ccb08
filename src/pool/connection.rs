//! Client connection abstraction.
//!
//! # Responsibilities
//! - Define what the pool needs from a store client connection
//! - Define how new connections are opened for a pool
//!
//! # Design Decisions
//! - The pool never speaks a store protocol; the embedding application
//!   supplies a [`ConnectionFactory`] wrapping its client library
//! - Factories receive the full [`EffectiveConfig`] so they can apply
//!   socket and total timeouts on their side

use std::error::Error;
use std::future::Future;

use crate::config::resolver::EffectiveConfig;
use crate::pool::key::PoolKey;

/// Boxed error returned by connection factories.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// A live client connection owned by a pool.
pub trait Connection: Send + 'static {
    /// Whether the connection can be handed to another caller.
    ///
    /// Checked when a connection is returned and before an idle one is
    /// reused. Connections that report `false` are closed and dropped.
    fn is_healthy(&self) -> bool {
        true
    }

    /// Release client resources. Called once before the connection is dropped.
    fn close(&mut self) {}
}

/// Opens connections for a pool.
pub trait ConnectionFactory: Send + Sync + 'static {
    type Connection: Connection;

    /// Open one connection for `key` using `config`.
    ///
    /// The pool bounds each call by `config.timeouts.connect` and retries up
    /// to `config.max_retries` times.
    fn connect(
        &self,
        key: &PoolKey,
        config: &EffectiveConfig,
    ) -> impl Future<Output = Result<Self::Connection, BoxError>> + Send;
}
