//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define pool metrics (constructions, timeouts, discards, idle size)
//! - Expose Prometheus-compatible metrics endpoint
//! - Label every series with namespace and role
//!
//! # Metrics
//! - `keyspace_pool_created_total` (counter): pools constructed
//! - `keyspace_pool_construction_failures_total` (counter): failed constructions
//! - `keyspace_pool_acquire_timeouts_total` (counter): checkouts that hit `pool_timeout`
//! - `keyspace_pool_connections_discarded_total` (counter): connections closed, by reason
//! - `keyspace_pool_idle_connections` (gauge): idle connections per pool
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::pool::PoolKey;

/// Install the Prometheus recorder and serve it on `addr`.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_pool_created(key: &PoolKey) {
    metrics::counter!(
        "keyspace_pool_created_total",
        "namespace" => key.namespace.clone(),
        "role" => key.role.as_str()
    )
    .increment(1);
}

pub fn record_pool_construction_failed(key: &PoolKey) {
    metrics::counter!(
        "keyspace_pool_construction_failures_total",
        "namespace" => key.namespace.clone(),
        "role" => key.role.as_str()
    )
    .increment(1);
}

pub fn record_acquire_timeout(key: &PoolKey) {
    metrics::counter!(
        "keyspace_pool_acquire_timeouts_total",
        "namespace" => key.namespace.clone(),
        "role" => key.role.as_str()
    )
    .increment(1);
}

pub fn record_connection_discarded(key: &PoolKey, reason: &'static str) {
    metrics::counter!(
        "keyspace_pool_connections_discarded_total",
        "namespace" => key.namespace.clone(),
        "role" => key.role.as_str(),
        "reason" => reason
    )
    .increment(1);
}

pub fn record_idle_connections(key: &PoolKey, idle: usize) {
    metrics::gauge!(
        "keyspace_pool_idle_connections",
        "namespace" => key.namespace.clone(),
        "role" => key.role.as_str()
    )
    .set(idle as f64);
}
