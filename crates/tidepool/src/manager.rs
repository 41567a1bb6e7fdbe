//! Public pool handle composing retry, pooling, and transaction scoping

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};

use futures::FutureExt;

use tidepool_core::{ConnectionFactory, RawConnection, Result};

use crate::pool::{PoolConfig, PoolStats, PooledConnection, ResourcePool};
use crate::scope::{TransactionScope, WorkOutcome};

/// A database connection pool with scoped transactional checkouts
///
/// This is the public entry point. It owns the bounded resource pool and a
/// background reaper task, and exposes `transaction` (a scoped checkout
/// following the settlement protocol) and `invalidate` (permanent removal
/// for callers that detect corruption mid-use).
///
/// Cloning the handle is cheap; every clone drives the same pool.
#[derive(Clone)]
pub struct DatabasePool {
    pool: Arc<ResourcePool>,
}

impl DatabasePool {
    /// Create a new pool and spawn its background reaper
    ///
    /// The reaper periodically evicts idle connections past their
    /// time-to-live and tops the pool back up to its minimum size. It runs
    /// until the pool is closed or every handle is dropped, so `new` must
    /// be called from within a tokio runtime.
    pub fn new<F: ConnectionFactory>(config: PoolConfig, factory: F) -> Self {
        let pool = Arc::new(ResourcePool::new(config, factory));
        Self::spawn_reaper(&pool);
        Self { pool }
    }

    fn spawn_reaper(pool: &Arc<ResourcePool>) {
        let weak: Weak<ResourcePool> = Arc::downgrade(pool);
        let interval = pool.config().reap_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(pool) = weak.upgrade() else { break };
                if pool.is_closed() {
                    break;
                }
                pool.evict_expired().await;
            }
            tracing::debug!("pool reaper stopped");
        });
    }

    /// Run a unit of work against a leased connection
    ///
    /// Acquires a connection (surfacing acquisition errors to the caller),
    /// hands it to `work`, and settles the lease by the scoping protocol:
    /// the connection is validated and then restored, rolled back and
    /// restored, or invalidated, depending on how the work went. The work's
    /// own result is returned unchanged.
    ///
    /// A panic inside `work` is caught at the scope boundary, settles the
    /// lease along the failure path, and then resumes unwinding.
    ///
    /// The work receives the raw connection, not the lease, so it cannot
    /// invalidate mid-use. A connection that breaks under the work fails
    /// the release-time liveness probe and is invalidated then; callers
    /// that must remove a connection the moment they detect corruption
    /// should use `acquire` plus `invalidate` instead.
    #[tracing::instrument(skip_all)]
    pub async fn transaction<T, F, Fut>(&self, work: F) -> Result<T>
    where
        F: FnOnce(Arc<dyn RawConnection>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let lease = self.pool.acquire().await?;
        let connection = lease.inner().clone();
        let scope = TransactionScope::new(lease);

        match AssertUnwindSafe(work(connection)).catch_unwind().await {
            Ok(Ok(value)) => {
                scope.finish(WorkOutcome::Succeeded).await;
                Ok(value)
            }
            Ok(Err(err)) => {
                scope.finish(WorkOutcome::Failed).await;
                Err(err)
            }
            Err(panic) => {
                scope.finish(WorkOutcome::Failed).await;
                std::panic::resume_unwind(panic)
            }
        }
    }

    /// Lease a connection without transaction scoping
    ///
    /// Dropping the returned lease restores the connection to the pool
    /// as-is; prefer `transaction` for work that can leave a transaction
    /// open.
    pub async fn acquire(&self) -> Result<PooledConnection<'_>> {
        self.pool.acquire().await
    }

    /// Permanently remove a leased connection from the pool and close it
    pub async fn invalidate(&self, lease: PooledConnection<'_>) {
        lease.invalidate().await;
    }

    /// Get current pool statistics
    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Get the pool configuration
    pub fn config(&self) -> &PoolConfig {
        self.pool.config()
    }

    /// Shut the pool down
    ///
    /// Blocked acquirers are woken with an error; idle connections are
    /// closed now and leased ones as they come back.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
