//! Retry scheduling for failed deliveries.
//!
//! Exponential backoff with a bounded retry budget: the delay before
//! attempt `n` doubles with every failure until the budget is spent, at
//! which point the record is terminal-failed and moves to the dead-letter
//! store.
//!
//! The schedule is deterministic - no jitter is applied - so delivery
//! timing is exactly reproducible in tests. Fleets of many clients
//! retrying against one backend may want a jittered variant.

use std::time::Duration;

/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default number of failed attempts before a record is terminal-failed.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Backoff schedule and retry budget for the queue processor.
///
/// With the defaults, a record is attempted at most 5 times, the retries
/// delayed by 1s, 2s, 4s and 8s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry; doubles with each further failure.
    pub base_delay: Duration,
    /// Failed attempts after which the record is terminal-failed.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given base delay and retry budget.
    pub fn new(base_delay: Duration, max_retries: u32) -> Self {
        Self {
            base_delay,
            max_retries,
        }
    }

    /// Delay before the next attempt after `retry_count` failures.
    ///
    /// `base_delay * 2^(retry_count - 1)`: 1s after the first failure,
    /// then 2s, 4s, 8s with the default base. `retry_count` is expected
    /// to be at least 1 (a record with zero failures is dispatched
    /// immediately).
    pub fn delay(&self, retry_count: u32) -> Duration {
        let exponent = retry_count.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Whether `retry_count` failures have spent the retry budget.
    pub fn is_exhausted(&self, retry_count: u32) -> bool {
        retry_count >= self.max_retries
    }
}
