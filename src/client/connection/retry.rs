//! # Reconnect Backoff
//!
//! Exponential backoff for the push channel: the n-th consecutive failure
//! waits `base * 2^(n-1)`. Once `max_attempts` retries have been spent the
//! policy gives up and the connection moves to `Error`.
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//! use vcms_sync::client::connection::retry::{BackoffPolicy, RetryDecision};
//!
//! let policy = BackoffPolicy::new(Duration::from_millis(1000), 3);
//! assert_eq!(policy.decide(0), RetryDecision::RetryAfter { attempt: 1, delay: Duration::from_millis(1000) });
//! assert_eq!(policy.decide(3), RetryDecision::GiveUp);
//! ```

use std::time::Duration;

/// Backoff configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Retries allowed before giving up
    pub max_attempts: u32,
}

/// What to do after a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Schedule retry number `attempt` after `delay`
    RetryAfter { attempt: u32, delay: Duration },
    /// Retry budget exhausted
    GiveUp,
}

impl BackoffPolicy {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
        }
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Decide the next step given how many retries were already spent
    pub fn decide(&self, attempts_so_far: u32) -> RetryDecision {
        if attempts_so_far >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        let attempt = attempts_so_far + 1;
        RetryDecision::RetryAfter {
            attempt,
            delay: self.delay_for(attempt),
        }
    }

    /// The full delay sequence until the cap
    pub fn schedule(&self) -> Vec<Duration> {
        (1..=self.max_attempts).map(|n| self.delay_for(n)).collect()
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(5000), 5)
    }
}
