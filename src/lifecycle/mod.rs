//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Logging/metrics → Pool manager → Background tasks
//!
//! Reload (reload.rs):
//!     File change or SIGHUP → Load config → Validate → Swap configuration
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop background tasks → Close pools
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGHUP → Trigger config reload
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then observability, then pools
//! - A failed reload keeps the running configuration

pub mod reload;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use reload::run_reload_loop;
pub use shutdown::{Shutdown, ShutdownSignal};
pub use startup::{start, Runtime, StartOptions, StartupError};
