//! Bounded connection pool
//!
//! This module provides the bounded resource pool: lazy connection creation
//! up to a maximum, idle time-to-live eviction, blocking acquisition when
//! the pool is exhausted, and permanent invalidation of broken connections.
//!
//! # Example
//!
//! ```ignore
//! use tidepool::pool::{PoolConfig, ResourcePool};
//!
//! let config = PoolConfig::new(1, 10)
//!     .with_acquire_timeout_ms(5_000)
//!     .with_idle_ttl_ms(300_000);
//!
//! let pool = ResourcePool::new(config, connection_factory);
//! let conn = pool.acquire().await?;
//! // Use connection...
//! // Connection returned to the idle set on drop
//! ```

mod config;
mod pool;
mod stats;


pub use config::PoolConfig;
pub use pool::{PooledConnection, ResourcePool};
pub use stats::PoolStats;
