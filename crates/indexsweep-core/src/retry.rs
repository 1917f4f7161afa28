//! Retry policy with an explicit wall-clock backoff budget.
//!
//! Requests against the index and the public API back off exponentially,
//! but the total time spent sleeping is bounded. Once the budget is spent
//! the last error surfaces to the caller, which decides whether the failed
//! unit of work is skippable or fatal.

use std::time::Duration;

/// Budget for interactive lookups inside a pass. A stuck page should not
/// stall the hourly cadence for long.
pub const SHORT_BUDGET: Duration = Duration::from_secs(30);

/// Budget for standalone reporting commands where waiting out a longer
/// outage is acceptable.
pub const LONG_BUDGET: Duration = Duration::from_secs(120);

/// First backoff delay in milliseconds.
pub const BASE_DELAY_MS: u64 = 500;

/// Cap for a single backoff sleep in milliseconds.
pub const MAX_DELAY_MS: u64 = 15_000;

/// Exponential backoff bounded by a cumulative sleep budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total time the policy may spend sleeping across all attempts.
    pub budget: Duration,
    /// Delay before the first retry. Doubles per attempt.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Policy for lookups on the critical path of a pass.
    pub fn short() -> Self {
        Self {
            budget: SHORT_BUDGET,
            base_delay: Duration::from_millis(BASE_DELAY_MS),
            max_delay: Duration::from_millis(MAX_DELAY_MS),
        }
    }

    /// Policy for reporting commands that prefer completion over latency.
    pub fn long() -> Self {
        Self {
            budget: LONG_BUDGET,
            base_delay: Duration::from_millis(BASE_DELAY_MS),
            max_delay: Duration::from_millis(MAX_DELAY_MS),
        }
    }

    /// Delay for the given zero-based attempt: base doubled per attempt,
    /// capped at `max_delay`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let max_ms = self.max_delay.as_millis() as u64;
        let delay_ms = base_ms
            .saturating_mul(2u64.saturating_pow(attempt))
            .min(max_ms);
        Duration::from_millis(delay_ms)
    }

    /// Next sleep to take after `attempt` failures with `waited` already
    /// spent, or `None` once the budget would be exceeded.
    pub fn next_delay(&self, attempt: u32, waited: Duration) -> Option<Duration> {
        let delay = self.backoff_delay(attempt);
        if waited + delay > self.budget {
            None
        } else {
            Some(delay)
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
