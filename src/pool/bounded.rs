//! A bounded pool for one (namespace, role).
//!
//! # Responsibilities
//! - Bound concurrent checkouts to `max_connections`
//! - Reuse idle connections, open new ones lazily
//! - Discard connections that fail health checks or are marked broken
//! - Close every connection on shutdown
//!
//! # Design Decisions
//! - A semaphore permit is the right to hold a connection; waiting for one
//!   is cancel-safe, so a timed-out caller leaves no queued waiter behind
//! - Idle connections live in a LIFO stack to keep hot connections hot
//! - The checkout guard returns its connection before releasing its permit

use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::resolver::EffectiveConfig;
use crate::observability::metrics;
use crate::pool::connection::{Connection, ConnectionFactory};
use crate::pool::error::PoolError;
use crate::pool::key::PoolKey;
use crate::resilience::Backoff;

/// Point-in-time view of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Maximum concurrent checkouts.
    pub max_size: usize,
    /// Open connections waiting to be checked out.
    pub idle: usize,
    /// Connections currently checked out.
    pub in_use: usize,
    /// Open connections, idle or checked out.
    pub live: usize,
}

/// Pool of connections for one [`PoolKey`].
pub struct ConnectionPool<F: ConnectionFactory> {
    key: PoolKey,
    config: Arc<EffectiveConfig>,
    factory: Arc<F>,
    max_size: usize,
    permits: Arc<Semaphore>,
    idle: Mutex<VecDeque<F::Connection>>,
    live: AtomicUsize,
    closed: AtomicBool,
    backoff: Backoff,
}

impl<F: ConnectionFactory> ConnectionPool<F> {
    /// Build a pool and open its first connection.
    ///
    /// Failing to open that connection fails construction, so an
    /// unreachable store is reported to the caller that asked for the pool.
    pub async fn connect(
        key: PoolKey,
        config: Arc<EffectiveConfig>,
        factory: Arc<F>,
    ) -> Result<Arc<Self>, PoolError> {
        let max_size = config.pool.max_connections.min(Semaphore::MAX_PERMITS);
        let pool = Arc::new(Self {
            key,
            config,
            factory,
            max_size,
            permits: Arc::new(Semaphore::new(max_size)),
            idle: Mutex::new(VecDeque::with_capacity(max_size.min(64))),
            live: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            backoff: Backoff::for_connect(),
        });

        let seed = pool.open_connection().await?;
        let idle = {
            let mut idle = pool.lock_idle();
            idle.push_back(seed);
            idle.len()
        };
        metrics::record_idle_connections(&pool.key, idle);

        tracing::info!(
            pool = %pool.key,
            hosts = pool.config.hosts_for(pool.key.role).len(),
            max_connections = pool.max_size,
            config_source = %pool.config.provenance,
            "Connection pool created"
        );
        Ok(pool)
    }

    pub fn key(&self) -> &PoolKey {
        &self.key
    }

    /// The configuration this pool was built from.
    pub fn config(&self) -> &EffectiveConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> PoolStats {
        let available = if self.is_closed() {
            self.max_size
        } else {
            self.permits.available_permits()
        };
        PoolStats {
            max_size: self.max_size,
            idle: self.lock_idle().len(),
            in_use: self.max_size.saturating_sub(available),
            live: self.live.load(Ordering::SeqCst),
        }
    }

    /// Check out a connection, waiting up to the pool timeout for capacity.
    pub async fn acquire(self: &Arc<Self>) -> Result<PooledConnection<F>, PoolError> {
        if self.is_closed() {
            return Err(PoolError::Closed { key: self.key.clone() });
        }

        let waited = self.config.pool.acquire_timeout;
        let permit = match tokio::time::timeout(waited, Arc::clone(&self.permits).acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(PoolError::Closed { key: self.key.clone() }),
            Err(_) => {
                metrics::record_acquire_timeout(&self.key);
                tracing::warn!(pool = %self.key, waited = ?waited, "Timed out waiting for a connection");
                return Err(PoolError::Timeout {
                    key: self.key.clone(),
                    waited,
                });
            }
        };

        let conn = match self.take_idle() {
            Some(conn) => conn,
            None => self.open_connection().await?,
        };

        Ok(PooledConnection {
            pool: Arc::clone(self),
            conn: Some(conn),
            broken: false,
            _permit: permit,
        })
    }

    /// Close idle connections and reject further checkouts. Idempotent.
    ///
    /// Checked-out connections are closed when they come back.
    pub fn shutdown(&self) {
        let drained: Vec<F::Connection> = {
            let mut idle = self.lock_idle();
            if self.closed.swap(true, Ordering::SeqCst) {
                return;
            }
            idle.drain(..).collect()
        };
        self.permits.close();

        let count = drained.len();
        for conn in drained {
            self.discard(conn, "shutdown");
        }
        metrics::record_idle_connections(&self.key, 0);
        tracing::info!(pool = %self.key, closed_idle = count, "Connection pool shut down");
    }

    async fn open_connection(&self) -> Result<F::Connection, PoolError> {
        let attempts = self.config.max_retries.saturating_add(1);
        let connect_timeout = self.config.timeouts.connect;
        let mut last_error = String::new();

        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(self.backoff.delay(attempt)).await;
            }

            match tokio::time::timeout(connect_timeout, self.factory.connect(&self.key, &self.config)).await {
                Ok(Ok(conn)) => {
                    self.live.fetch_add(1, Ordering::SeqCst);
                    return Ok(conn);
                }
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => last_error = format!("connect timed out after {connect_timeout:?}"),
            }

            tracing::warn!(
                pool = %self.key,
                attempt = attempt + 1,
                attempts,
                error = %last_error,
                "Connect attempt failed"
            );
        }

        Err(PoolError::Connection {
            key: self.key.clone(),
            reason: last_error,
        })
    }

    fn take_idle(&self) -> Option<F::Connection> {
        let mut stale = Vec::new();
        let (found, remaining) = {
            let mut idle = self.lock_idle();
            let found = loop {
                match idle.pop_back() {
                    Some(conn) if conn.is_healthy() => break Some(conn),
                    Some(conn) => stale.push(conn),
                    None => break None,
                }
            };
            (found, idle.len())
        };

        for conn in stale {
            self.discard(conn, "unhealthy");
        }
        metrics::record_idle_connections(&self.key, remaining);
        found
    }

    fn release(&self, conn: F::Connection, broken: bool) {
        if broken || !conn.is_healthy() {
            tracing::debug!(pool = %self.key, "Discarding broken connection");
            self.discard(conn, "broken");
            return;
        }

        let mut idle = self.lock_idle();
        if self.is_closed() {
            drop(idle);
            self.discard(conn, "closed");
            return;
        }
        idle.push_back(conn);
        let count = idle.len();
        drop(idle);
        metrics::record_idle_connections(&self.key, count);
    }

    fn discard(&self, mut conn: F::Connection, reason: &'static str) {
        conn.close();
        self.live.fetch_sub(1, Ordering::SeqCst);
        metrics::record_connection_discarded(&self.key, reason);
    }

    fn lock_idle(&self) -> MutexGuard<'_, VecDeque<F::Connection>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<F: ConnectionFactory> Drop for ConnectionPool<F> {
    fn drop(&mut self) {
        let idle = self.idle.get_mut().unwrap_or_else(PoisonError::into_inner);
        for mut conn in idle.drain(..) {
            conn.close();
        }
    }
}

impl<F: ConnectionFactory> fmt::Debug for ConnectionPool<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("key", &self.key)
            .field("stats", &self.stats())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// A checked-out connection. Returns to its pool on drop.
///
/// A connection dropped while marked broken, or while the thread is
/// unwinding, is closed instead of returned.
pub struct PooledConnection<F: ConnectionFactory> {
    pool: Arc<ConnectionPool<F>>,
    conn: Option<F::Connection>,
    broken: bool,
    _permit: OwnedSemaphorePermit,
}

impl<F: ConnectionFactory> PooledConnection<F> {
    pub fn key(&self) -> &PoolKey {
        &self.pool.key
    }

    /// Close this connection on drop instead of returning it.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    pub(crate) fn set_broken(&mut self, broken: bool) {
        self.broken = broken;
    }
}

impl<F: ConnectionFactory> Deref for PooledConnection<F> {
    type Target = F::Connection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("connection is present until drop")
    }
}

impl<F: ConnectionFactory> DerefMut for PooledConnection<F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("connection is present until drop")
    }
}

impl<F: ConnectionFactory> Drop for PooledConnection<F> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let broken = self.broken || std::thread::panicking();
            self.pool.release(conn, broken);
        }
    }
}

impl<F: ConnectionFactory> fmt::Debug for PooledConnection<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("pool", &self.pool.key)
            .field("broken", &self.broken)
            .finish()
    }
}
