//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Pool seeding / replacement connect:
//!     → connect attempt bounded by connect_timeout
//!     → On failure: backoff.rs (jittered exponential delay)
//!     → retry until max_retries is exhausted
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every connect attempt has a deadline
//! - Jitter keeps many pools from reconnecting in lockstep

pub mod backoff;

pub use backoff::Backoff;
