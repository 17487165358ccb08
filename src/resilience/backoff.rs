//! Exponential backoff with jitter.

use std::time::Duration;
use rand::Rng;

/// Base delay between connect attempts.
pub const CONNECT_BACKOFF_BASE: Duration = Duration::from_millis(50);

/// Ceiling for the delay between connect attempts.
pub const CONNECT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Exponential backoff policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Policy used between connect attempts while seeding a pool.
    pub fn for_connect() -> Self {
        Self::new(CONNECT_BACKOFF_BASE, CONNECT_BACKOFF_MAX)
    }

    /// Delay before retry number `attempt` (1-based). Attempt 0 never waits.
    pub fn delay(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, millis(self.base), millis(self.max))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::for_connect()
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}
