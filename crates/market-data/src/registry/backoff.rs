//! Exponential backoff with jitter for rate-limit retries.

use std::time::Duration;

use rand::Rng;

pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(3);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Jitter factor range applied to every delay.
const JITTER_RANGE: std::ops::Range<f64> = 0.5..1.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry `attempt` (0-based) with a random jitter factor.
    pub fn delay(&self, attempt: u32, error_count: u32) -> Duration {
        let jitter = rand::thread_rng().gen_range(JITTER_RANGE);
        self.delay_with_jitter(attempt, error_count, jitter)
    }

    /// `min(base * 2^attempt, max) * jitter * (1 + 0.5 * error_count)`.
    ///
    /// The jitter and error-count factors apply after the cap, so the result
    /// can exceed `max_delay`.
    pub fn delay_with_jitter(&self, attempt: u32, error_count: u32, jitter: f64) -> Duration {
        let exponential = self.base_delay.as_secs_f64() * 2f64.powi(attempt.min(32) as i32);
        let capped = exponential.min(self.max_delay.as_secs_f64());
        let penalty = 1.0 + 0.5 * f64::from(error_count);
        let seconds = capped * jitter * penalty;
        if seconds.is_finite() && seconds > 0.0 {
            Duration::from_secs_f64(seconds)
        } else {
            Duration::ZERO
        }
    }
}
