//! Pool registry.
//!
//! # Responsibilities
//! - Map (namespace, role) to exactly one live pool
//! - Build pools lazily, once, even under concurrent first access
//! - Lend connections to callbacks and always take them back
//! - Shut down and rebuild pools on teardown or reconfiguration
//!
//! # Design Decisions
//! - Each registry slot is either ready or constructing; the constructing
//!   slot carries a watch channel that waiters subscribe to
//! - The shard lock is never held across an await
//! - A failed construction removes its slot, so the next caller retries
//! - A dropped constructor removes its slot too; waiters then retry
//! - Reconfiguration retires pools instead of closing them, so in-flight
//!   work finishes on the configuration it started with
//! - A pool whose construction straddles a shutdown is closed before it is
//!   delivered; callers going through `acquire` then rebuild

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use tokio::sync::watch;

use crate::config::resolver::ConfigResolver;
use crate::config::schema::Settings;
use crate::observability::metrics;
use crate::pool::bounded::{ConnectionPool, PoolStats, PooledConnection};
use crate::pool::connection::{Connection, ConnectionFactory};
use crate::pool::error::PoolError;
use crate::pool::key::{PoolKey, PoolRole};
use crate::pool::provider::NamespaceHandle;

type Construction<F> = Option<Result<Arc<ConnectionPool<F>>, PoolError>>;

enum Slot<F: ConnectionFactory> {
    Ready(Arc<ConnectionPool<F>>),
    Constructing {
        id: u64,
        rx: watch::Receiver<Construction<F>>,
    },
}

enum Step<F: ConnectionFactory> {
    Ready(Arc<ConnectionPool<F>>),
    Wait(watch::Receiver<Construction<F>>),
    Build(u64, watch::Sender<Construction<F>>),
}

/// Owns every pool in the process and the configuration they are built from.
pub struct ConnectionPoolManager<F: ConnectionFactory> {
    factory: Arc<F>,
    resolver: ArcSwap<ConfigResolver>,
    pools: DashMap<PoolKey, Slot<F>>,
    next_construction: AtomicU64,
    shutdown_epoch: AtomicU64,
}

impl<F: ConnectionFactory> ConnectionPoolManager<F> {
    pub fn new(settings: Settings, factory: F) -> Self {
        Self {
            factory: Arc::new(factory),
            resolver: ArcSwap::from_pointee(ConfigResolver::new(settings)),
            pools: DashMap::new(),
            next_construction: AtomicU64::new(0),
            shutdown_epoch: AtomicU64::new(0),
        }
    }

    /// The resolver new pools are built from.
    pub fn resolver(&self) -> Arc<ConfigResolver> {
        self.resolver.load_full()
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Number of ready pools.
    pub fn pool_count(&self) -> usize {
        self.pools
            .iter()
            .filter(|entry| matches!(entry.value(), Slot::Ready(_)))
            .count()
    }

    /// Statistics for an existing pool, without creating it.
    pub fn stats(&self, namespace: &str, role: PoolRole) -> Option<PoolStats> {
        let key = self.key_for(namespace, role);
        let pool = match self.pools.get(&key).as_deref() {
            Some(Slot::Ready(pool)) => Arc::clone(pool),
            _ => return None,
        };
        Some(pool.stats())
    }

    /// Handle bound to one namespace.
    pub fn namespace(self: &Arc<Self>, name: impl Into<String>) -> NamespaceHandle<Self> {
        NamespaceHandle::new(Arc::clone(self), name)
    }

    /// The pool for (namespace, role), built on first access.
    ///
    /// An empty namespace means the default namespace. Concurrent callers
    /// for the same key share a single construction and its outcome.
    pub async fn pool_for(
        &self,
        namespace: &str,
        role: PoolRole,
    ) -> Result<Arc<ConnectionPool<F>>, PoolError> {
        let key = self.key_for(namespace, role);

        loop {
            let step = match self.pools.entry(key.clone()) {
                Entry::Occupied(entry) => match entry.get() {
                    Slot::Ready(pool) => Step::Ready(Arc::clone(pool)),
                    Slot::Constructing { rx, .. } => Step::Wait(rx.clone()),
                },
                Entry::Vacant(entry) => {
                    let id = self.next_construction.fetch_add(1, Ordering::Relaxed);
                    let (tx, rx) = watch::channel(None);
                    entry.insert(Slot::Constructing { id, rx });
                    Step::Build(id, tx)
                }
            };

            match step {
                Step::Ready(pool) => return Ok(pool),
                Step::Wait(mut rx) => {
                    let outcome = rx.wait_for(Option::is_some).await.map(|value| (*value).clone());
                    match outcome {
                        Ok(Some(result)) => return result,
                        // Constructor went away without an outcome.
                        _ => continue,
                    }
                }
                Step::Build(id, tx) => return self.build(key, id, tx).await,
            }
        }
    }

    /// Check out a connection from the pool for (namespace, role).
    pub async fn acquire(
        &self,
        namespace: &str,
        role: PoolRole,
    ) -> Result<PooledConnection<F>, PoolError> {
        loop {
            let pool = self.pool_for(namespace, role).await?;
            match pool.acquire().await {
                // Shut down between lookup and checkout; the next lookup rebuilds.
                Err(PoolError::Closed { .. }) => continue,
                other => return other,
            }
        }
    }

    /// Lend a connection to `f` and take it back on every exit path.
    ///
    /// The connection goes back to the pool when `f` completes and the
    /// connection still reports healthy, whether `f` succeeded or not. It is
    /// closed instead if it reports unhealthy, if `f` panics, or if this
    /// future is dropped before `f` completes.
    pub async fn with_connection<T, E, Func>(
        &self,
        namespace: &str,
        role: PoolRole,
        f: Func,
    ) -> Result<T, E>
    where
        E: From<PoolError>,
        Func: for<'c> FnOnce(&'c mut F::Connection) -> BoxFuture<'c, Result<T, E>>,
    {
        let mut conn = self.acquire(namespace, role).await?;
        conn.set_broken(true);
        let result = f(&mut *conn).await;
        let healthy = conn.is_healthy();
        conn.set_broken(!healthy);
        result
    }

    /// Close every pool. Idempotent; later calls rebuild pools on demand.
    pub fn shutdown(&self) {
        // Bumped before the sweep so constructions that lose their slot see it.
        self.shutdown_epoch.fetch_add(1, Ordering::SeqCst);
        let mut ready = Vec::new();
        self.pools.retain(|_, slot| {
            if let Slot::Ready(pool) = slot {
                ready.push(Arc::clone(pool));
            }
            false
        });

        for pool in &ready {
            pool.shutdown();
        }
        tracing::info!(closed_pools = ready.len(), "Connection pools shut down");
    }

    /// Replace the active configuration.
    ///
    /// Existing pools leave the registry but stay open for the connections
    /// they have lent out; each closes once its last user is done. Pools
    /// built afterwards use `settings`.
    pub fn reconfigure(&self, settings: Settings) {
        let provenance = settings.provenance;
        self.resolver.store(Arc::new(ConfigResolver::new(settings)));

        let mut retired = 0usize;
        self.pools.retain(|_, slot| {
            if matches!(slot, Slot::Ready(_)) {
                retired += 1;
            }
            false
        });
        tracing::info!(
            retired_pools = retired,
            config_source = %provenance,
            "Configuration replaced"
        );
    }

    fn key_for(&self, namespace: &str, role: PoolRole) -> PoolKey {
        let resolver = self.resolver.load();
        let namespace = if namespace.is_empty() {
            resolver.default_namespace()
        } else {
            namespace
        };
        PoolKey::new(namespace, role.normalize(resolver.store()))
    }

    async fn build(
        &self,
        key: PoolKey,
        id: u64,
        tx: watch::Sender<Construction<F>>,
    ) -> Result<Arc<ConnectionPool<F>>, PoolError> {
        let guard = ConstructionGuard {
            pools: &self.pools,
            key: &key,
            id,
        };
        let epoch = self.shutdown_epoch.load(Ordering::SeqCst);

        let config = {
            let resolver = self.resolver.load();
            if !resolver.is_declared(&key.namespace) {
                tracing::debug!(namespace = %key.namespace, "Namespace not declared, using global defaults");
            }
            Arc::new(resolver.resolve(&key.namespace))
        };

        let result = ConnectionPool::connect(key.clone(), config, Arc::clone(&self.factory)).await;

        match &result {
            Ok(pool) => {
                let mut registered = false;
                if let Some(mut slot) = self.pools.get_mut(&key) {
                    if matches!(&*slot, Slot::Constructing { id: current, .. } if *current == id) {
                        *slot = Slot::Ready(Arc::clone(pool));
                        registered = true;
                    }
                }
                metrics::record_pool_created(&key);

                if !registered && self.shutdown_epoch.load(Ordering::SeqCst) != epoch {
                    tracing::debug!(pool = %key, "Pool finished construction after shutdown, closing it");
                    pool.shutdown();
                }
            }
            Err(e) => {
                metrics::record_pool_construction_failed(&key);
                tracing::warn!(pool = %key, error = %e, "Pool construction failed");
            }
        }

        // Removes the slot unless it was promoted to ready above.
        drop(guard);
        tx.send_replace(Some(result.clone()));
        result
    }
}

impl<F: ConnectionFactory> fmt::Debug for ConnectionPoolManager<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPoolManager")
            .field("pools", &self.pool_count())
            .field("default_namespace", &self.resolver.load().default_namespace())
            .finish()
    }
}

struct ConstructionGuard<'a, F: ConnectionFactory> {
    pools: &'a DashMap<PoolKey, Slot<F>>,
    key: &'a PoolKey,
    id: u64,
}

impl<F: ConnectionFactory> Drop for ConstructionGuard<'_, F> {
    fn drop(&mut self) {
        let id = self.id;
        self.pools.remove_if(self.key, |_, slot| {
            matches!(slot, Slot::Constructing { id: current, .. } if *current == id)
        });
    }
}
