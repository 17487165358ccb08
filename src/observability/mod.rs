//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! config and pool subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Every pool event carries namespace and role
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
