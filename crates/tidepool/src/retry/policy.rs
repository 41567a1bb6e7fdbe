//! Retry policy applied to the connect operation

use std::future::Future;

use serde::{Deserialize, Serialize};
use tidepool_core::Result;

use super::backoff::BackoffStrategy;

/// Retry schedule for a fallible acquisition operation.
///
/// The policy is a pure value: it holds a total attempt budget and a backoff
/// schedule, and `run` drives an operation through them. Every failure from
/// the operation is treated as retryable; classifying errors is the caller's
/// concern, not the policy's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    max_attempts: u32,
    /// Backoff schedule between attempts
    backoff: BackoffStrategy,
}

impl RetryPolicy {
    /// Create a new retry policy.
    ///
    /// `max_attempts` is the total attempt budget and is clamped to at
    /// least 1 (the operation always runs once).
    pub fn new(max_attempts: u32, backoff: BackoffStrategy) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Get the total attempt budget.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Get the backoff schedule.
    pub fn backoff(&self) -> &BackoffStrategy {
        &self.backoff
    }

    /// Run `operation` until it succeeds or the attempt budget is exhausted.
    ///
    /// Returns the first success, or the last failure once all attempts are
    /// spent. Sleeps the backoff delay between attempts.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        return Err(err);
                    }
                    let delay = self.backoff.calculate_delay(attempt - 1);
                    tracing::debug!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %err,
                        ?delay,
                        "acquisition attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    /// Default policy: 3 attempts with the default backoff schedule
    fn default() -> Self {
        Self::new(3, BackoffStrategy::default())
    }
}
