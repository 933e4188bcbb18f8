//! Retry strategy configuration.
//!
//! This module builds the backoff schedule used by the per-edition retry loop.

use std::time::{Duration, Instant};

use rand::Rng;
use tokio_retry::strategy::ExponentialBackoff;

use crate::config::{
    RETRY_FACTOR, RETRY_INITIAL_DELAY_MS, RETRY_JITTER_MIN, RETRY_MAX_DELAY_SECS,
};

/// Creates an exponential backoff retry strategy bounded by a time budget.
///
/// Returns a retry strategy configured with:
/// - Initial delay: `RETRY_INITIAL_DELAY_MS` milliseconds
/// - Backoff factor: `RETRY_FACTOR` (doubles delay each retry)
/// - Maximum delay: `RETRY_MAX_DELAY_SECS` seconds
/// - Jitter: each delay is scaled into `[RETRY_JITTER_MIN, 1.0]` of its nominal value
///
/// The budget is measured in wall-clock time from the moment this function is
/// called, so slow attempts consume it too. No delay is yielded that would end
/// past `retry_for`. A zero budget yields no delays at all: exactly one attempt.
///
/// # Arguments
///
/// * `retry_for` - Total time allowed for retries
///
/// # Returns
///
/// A retry strategy iterator ready for use with `tokio_retry::RetryIf`.
pub fn get_retry_strategy(retry_for: Duration) -> RetryBudget {
    RetryBudget::new(retry_for, Instant::now())
}

/// Backoff schedule that stops yielding once the time budget is spent.
#[derive(Debug, Clone)]
pub struct RetryBudget {
    backoff: ExponentialBackoff,
    deadline: Option<Instant>,
    jitter_min: f64,
}

impl RetryBudget {
    pub(crate) fn new(retry_for: Duration, started: Instant) -> Self {
        // ExponentialBackoff yields base^n * factor, so base 2 with factor
        // INITIAL/2 gives INITIAL, 2*INITIAL, 4*INITIAL, ...
        let backoff = ExponentialBackoff::from_millis(RETRY_FACTOR as u64)
            .factor(RETRY_INITIAL_DELAY_MS / RETRY_FACTOR as u64)
            .max_delay(Duration::from_secs(RETRY_MAX_DELAY_SECS));

        Self {
            backoff,
            deadline: (!retry_for.is_zero()).then(|| started + retry_for),
            jitter_min: RETRY_JITTER_MIN,
        }
    }

    /// Disables jitter, making the schedule deterministic.
    #[cfg(test)]
    fn without_jitter(mut self) -> Self {
        self.jitter_min = 1.0;
        self
    }
}

impl Iterator for RetryBudget {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let deadline = self.deadline?;
        let nominal = self.backoff.next()?;

        let delay = if self.jitter_min < 1.0 {
            nominal.mul_f64(rand::rng().random_range(self.jitter_min..=1.0))
        } else {
            nominal
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        if delay > remaining {
            self.deadline = None;
            return None;
        }
        Some(delay)
    }
}
