//! The contract consumed by data-operation layers.
//!
//! # Responsibilities
//! - Lend a connection for a namespace and role to a callback
//! - Bind a namespace once and reuse it ([`NamespaceHandle`])
//! - Give data layers an explicit not-found result ([`Lookup`])

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::pool::connection::ConnectionFactory;
use crate::pool::error::PoolError;
use crate::pool::key::PoolRole;
use crate::pool::manager::ConnectionPoolManager;

/// Something that can lend pooled connections.
pub trait ConnectionProvider: Send + Sync {
    type Connection: Send;

    /// Run `f` with a connection for (namespace, role).
    fn with_connection<T, E, Func>(
        &self,
        namespace: &str,
        role: PoolRole,
        f: Func,
    ) -> impl Future<Output = Result<T, E>> + Send
    where
        T: Send,
        E: From<PoolError> + Send,
        Func: for<'c> FnOnce(&'c mut Self::Connection) -> BoxFuture<'c, Result<T, E>> + Send;

    /// Run `f` with a connection of the default role.
    fn with_default_connection<T, E, Func>(
        &self,
        namespace: &str,
        f: Func,
    ) -> impl Future<Output = Result<T, E>> + Send
    where
        T: Send,
        E: From<PoolError> + Send,
        Func: for<'c> FnOnce(&'c mut Self::Connection) -> BoxFuture<'c, Result<T, E>> + Send,
    {
        self.with_connection(namespace, PoolRole::Default, f)
    }
}

impl<F: ConnectionFactory> ConnectionProvider for ConnectionPoolManager<F> {
    type Connection = F::Connection;

    async fn with_connection<T, E, Func>(
        &self,
        namespace: &str,
        role: PoolRole,
        f: Func,
    ) -> Result<T, E>
    where
        T: Send,
        E: From<PoolError> + Send,
        Func: for<'c> FnOnce(&'c mut Self::Connection) -> BoxFuture<'c, Result<T, E>> + Send,
    {
        ConnectionPoolManager::with_connection(self, namespace, role, f).await
    }
}

/// A provider bound to one namespace.
pub struct NamespaceHandle<P> {
    provider: Arc<P>,
    namespace: String,
}

impl<P> Clone for NamespaceHandle<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            namespace: self.namespace.clone(),
        }
    }
}

impl<P> std::fmt::Debug for NamespaceHandle<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespaceHandle")
            .field("namespace", &self.namespace)
            .finish()
    }
}

impl<P: ConnectionProvider> NamespaceHandle<P> {
    pub fn new(provider: Arc<P>, namespace: impl Into<String>) -> Self {
        Self {
            provider,
            namespace: namespace.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.namespace
    }

    pub async fn with_connection<T, E, Func>(&self, role: PoolRole, f: Func) -> Result<T, E>
    where
        T: Send,
        E: From<PoolError> + Send,
        Func: for<'c> FnOnce(&'c mut P::Connection) -> BoxFuture<'c, Result<T, E>> + Send,
    {
        self.provider.with_connection(&self.namespace, role, f).await
    }

    pub async fn with_read<T, E, Func>(&self, f: Func) -> Result<T, E>
    where
        T: Send,
        E: From<PoolError> + Send,
        Func: for<'c> FnOnce(&'c mut P::Connection) -> BoxFuture<'c, Result<T, E>> + Send,
    {
        self.with_connection(PoolRole::Read, f).await
    }

    pub async fn with_write<T, E, Func>(&self, f: Func) -> Result<T, E>
    where
        T: Send,
        E: From<PoolError> + Send,
        Func: for<'c> FnOnce(&'c mut P::Connection) -> BoxFuture<'c, Result<T, E>> + Send,
    {
        self.with_connection(PoolRole::Write, f).await
    }
}

/// Outcome of a keyed read: the record, or a definite absence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Found(value) => Lookup::Found(f(value)),
            Lookup::NotFound => Lookup::NotFound,
        }
    }

    pub fn unwrap_or(self, default: T) -> T {
        self.found().unwrap_or(default)
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Lookup::Found(value),
            None => Lookup::NotFound,
        }
    }
}
