//! Exponential backoff schedule for acquisition retries

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exponential backoff schedule for retrying connection acquisition.
///
/// Delays grow exponentially with each attempt, capped at a configurable
/// maximum. Optional jitter spreads out retries so many callers hitting a
/// recovering server do not reconnect in lockstep.
///
/// # Example
///
/// ```
/// use tidepool::retry::BackoffStrategy;
/// use std::time::Duration;
///
/// let backoff = BackoffStrategy::new(100, 30_000);
///
/// assert_eq!(backoff.calculate_delay(0), Duration::from_millis(100));
/// assert_eq!(backoff.calculate_delay(1), Duration::from_millis(200));
/// assert!(backoff.calculate_delay(20) <= Duration::from_millis(30_000));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffStrategy {
    /// Delay in milliseconds before the first retry
    initial_ms: u64,
    /// Cap in milliseconds for exponential growth
    max_ms: u64,
    /// Multiplier for exponential growth
    multiplier: f64,
    /// Whether delays get randomized jitter
    jitter: bool,
}

impl BackoffStrategy {
    /// Create a new backoff schedule with the given initial and maximum delays.
    pub fn new(initial_ms: u64, max_ms: u64) -> Self {
        Self {
            initial_ms: initial_ms.max(1),
            max_ms: max_ms.max(initial_ms),
            multiplier: 2.0,
            jitter: false,
        }
    }

    /// Set the multiplier for exponential growth.
    ///
    /// Default is 2.0 (delay doubles each attempt).
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    /// Enable jitter to add randomness to delays.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Calculate the delay before the retry with the given zero-based
    /// attempt number.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay_ms = (self.initial_ms as f64) * self.multiplier.powi(attempt as i32);
        let capped_ms = delay_ms.min(self.max_ms as f64) as u64;

        // Jitter shifts the delay by up to 25% in either direction
        let final_ms = if self.jitter {
            let jitter_range = capped_ms / 4;
            let jitter = (rand_simple() * (jitter_range * 2) as f64) as u64;
            capped_ms
                .saturating_sub(jitter_range)
                .saturating_add(jitter)
        } else {
            capped_ms
        };

        Duration::from_millis(final_ms)
    }

    /// Get the initial delay.
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_ms)
    }

    /// Get the maximum delay.
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }

    /// Get the multiplier.
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Check if jitter is enabled.
    pub fn has_jitter(&self) -> bool {
        self.jitter
    }
}

impl Default for BackoffStrategy {
    /// Default backoff: 100ms initial, 30 seconds max, 2x multiplier
    fn default() -> Self {
        Self::new(100, 30_000)
    }
}

/// Simple pseudo-random number generator for jitter.
/// Returns a value between 0.0 and 1.0.
fn rand_simple() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}
