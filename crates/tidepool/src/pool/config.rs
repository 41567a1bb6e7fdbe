//! Pool configuration types

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Configuration for a connection pool
///
/// Controls pool sizing, acquisition behavior, and connection lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Minimum number of connections the reaper keeps alive (best effort)
    min_size: usize,
    /// Maximum number of connections allowed in the pool
    max_size: usize,
    /// Timeout in milliseconds when acquiring a connection from the pool
    acquire_timeout_ms: u64,
    /// Time in milliseconds an idle connection may sit unused before eviction
    idle_ttl_ms: u64,
    /// Interval in milliseconds between background reaper passes
    reap_interval_ms: u64,
    /// Retry schedule applied to the connect operation
    retry: RetryPolicy,
}

impl PoolConfig {
    /// Create a new pool configuration with the given min and max sizes
    ///
    /// # Panics
    ///
    /// Panics if `min_size > max_size` or if `max_size` is 0.
    pub fn new(min_size: usize, max_size: usize) -> Self {
        assert!(
            max_size > 0,
            "max_size must be greater than 0, got {}",
            max_size
        );
        assert!(
            min_size <= max_size,
            "min_size ({}) cannot exceed max_size ({})",
            min_size,
            max_size
        );

        Self {
            min_size,
            max_size,
            acquire_timeout_ms: 30_000, // 30 seconds default
            idle_ttl_ms: 600_000,       // 10 minutes default
            reap_interval_ms: 30_000,   // 30 seconds default
            retry: RetryPolicy::default(),
        }
    }

    /// Set the acquire timeout in milliseconds
    pub fn with_acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = timeout_ms;
        self
    }

    /// Set the idle time-to-live in milliseconds
    pub fn with_idle_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.idle_ttl_ms = ttl_ms;
        self
    }

    /// Set the background reaper interval in milliseconds
    pub fn with_reap_interval_ms(mut self, interval_ms: u64) -> Self {
        self.reap_interval_ms = interval_ms;
        self
    }

    /// Set the retry policy applied to the connect operation
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Get the minimum pool size
    pub fn min_size(&self) -> usize {
        self.min_size
    }

    /// Get the maximum pool size
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Get the acquire timeout as a Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Get the idle time-to-live as a Duration
    pub fn idle_ttl(&self) -> Duration {
        Duration::from_millis(self.idle_ttl_ms)
    }

    /// Get the reaper interval as a Duration
    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms)
    }

    /// Get the retry policy
    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }
}

impl Default for PoolConfig {
    /// Create a default pool configuration
    ///
    /// Defaults:
    /// - min_size: 1
    /// - max_size: 10
    /// - acquire_timeout: 30 seconds
    /// - idle_ttl: 10 minutes
    /// - reap_interval: 30 seconds
    fn default() -> Self {
        Self::new(1, 10)
    }
}
