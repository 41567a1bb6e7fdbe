//! Tidepool - Bounded database connection pooling with transactional leases
//!
//! This crate manages a bounded set of live database connections and hands
//! out scoped transactional leases over them. Every lease ends in exactly
//! one of three states: restored to the idle set, restored after a rollback,
//! or invalidated (permanently removed and closed). A connection is never
//! returned to the pool in a state that could corrupt subsequent use.
//!
//! # Example
//!
//! ```ignore
//! use tidepool::{DatabasePool, PoolConfig};
//!
//! let config = PoolConfig::new(1, 10).with_idle_ttl_ms(300_000);
//! let pool = DatabasePool::new(config, my_factory);
//!
//! let rows = pool
//!     .transaction(|conn| async move {
//!         // run work against the leased connection
//!         Ok(42)
//!     })
//!     .await?;
//! ```

mod manager;
pub mod pool;
pub mod retry;
pub mod scope;

pub use manager::DatabasePool;
pub use pool::{PoolConfig, PoolStats, PooledConnection, ResourcePool};
pub use retry::{BackoffStrategy, RetryPolicy};
pub use scope::{TransactionScope, WorkOutcome};
pub use tidepool_core::{ConnectionFactory, RawConnection, Result, TidepoolError};
