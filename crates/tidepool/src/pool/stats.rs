//! Pool statistics types

use serde::{Deserialize, Serialize};

/// Statistics about a connection pool's current state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Total number of live connections (idle + leased)
    total: usize,
    /// Number of idle connections available in the pool
    idle: usize,
    /// Number of connections currently leased out
    leased: usize,
    /// Number of callers waiting for a connection
    waiting: usize,
}

impl PoolStats {
    /// Create new pool statistics
    pub fn new(total: usize, idle: usize, leased: usize, waiting: usize) -> Self {
        Self {
            total,
            idle,
            leased,
            waiting,
        }
    }

    /// Get the total number of live connections
    pub fn total(&self) -> usize {
        self.total
    }

    /// Get the number of idle connections
    pub fn idle(&self) -> usize {
        self.idle
    }

    /// Get the number of leased (in-use) connections
    pub fn leased(&self) -> usize {
        self.leased
    }

    /// Get the number of waiting callers
    pub fn waiting(&self) -> usize {
        self.waiting
    }

    /// Calculate pool utilization as a fraction (0.0 to 1.0)
    ///
    /// Returns 0.0 if total is 0 to avoid division by zero.
    pub fn utilization(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.leased as f64 / self.total as f64
        }
    }

    /// Check if every live connection is leased out
    pub fn is_full(&self) -> bool {
        self.idle == 0 && self.total > 0
    }
}

impl Default for PoolStats {
    fn default() -> Self {
        Self::new(0, 0, 0, 0)
    }
}
