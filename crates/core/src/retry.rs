//! Bounded retry policy
//!
//! Used for subscription creation (fixed delay) and broker connection
//! (exponential backoff).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy for a fallible acquisition step
///
/// `max_attempts` counts every try, including the first; it is never less
/// than one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts (1 = no retries)
    pub max_attempts: u32,
    /// Delay after the first failed attempt in milliseconds
    pub delay_ms: u64,
    /// Upper bound for a single delay in milliseconds
    pub max_delay_ms: u64,
    /// Double the delay after every failed attempt
    pub exponential: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 500,
            max_delay_ms: 5_000,
            exponential: false,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that tries exactly once
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Fixed delay between attempts
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        let delay_ms = delay.as_millis() as u64;
        Self {
            max_attempts,
            delay_ms,
            max_delay_ms: delay_ms,
            exponential: false,
        }
    }

    /// Set the total number of attempts
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the base delay
    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Set the delay cap
    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Switch to exponential backoff
    pub fn with_exponential_backoff(mut self) -> Self {
        self.exponential = true;
        self
    }

    /// Attempts to make, clamped to at least one
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if !self.exponential {
            return Duration::from_millis(self.delay_ms);
        }
        // Cap the shift to prevent overflow
        let shift = attempt.saturating_sub(1).min(63);
        let delay_ms = self.delay_ms.saturating_mul(1u64 << shift);
        Duration::from_millis(delay_ms.min(self.max_delay_ms.max(self.delay_ms)))
    }
}
