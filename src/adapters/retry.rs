//! Retry policy and backoff calculation for adapter calls.

use std::time::Duration;

/// Default base delay between attempts in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 200;
/// Default cap on a single delay in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 5_000;

/// How often, and how patiently, a failed adapter call is re-attempted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts beyond the first.
    pub max_retries: u32,
    /// Delay before the first retry in ms; doubles on each further retry.
    pub base_delay_ms: u64,
    /// Upper bound for any single delay in ms.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_delays(mut self, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Total attempts including the first one.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay to wait before retry number `retry` (zero-based).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        Duration::from_millis(calculate_backoff_delay(
            retry,
            self.base_delay_ms,
            self.max_delay_ms,
        ))
    }
}

/// Exponential backoff: `min(max_delay, base_delay * 2^retry)`.
#[must_use]
pub fn calculate_backoff_delay(retry: u32, base_delay_ms: u64, max_delay_ms: u64) -> u64 {
    let exponential = base_delay_ms.saturating_mul(1u64 << retry.min(31));
    exponential.min(max_delay_ms)
}
