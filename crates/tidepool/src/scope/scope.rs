//! Transaction scope implementation

use std::sync::Arc;

use tidepool_core::RawConnection;

use crate::pool::PooledConnection;

/// Outcome of the work executed against a leased connection
///
/// The outcome is passed explicitly into `TransactionScope::finish`; the
/// scope never infers it. Callers translating panics must map them to
/// `Failed` before resuming the unwind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOutcome {
    /// The unit of work completed; nothing to undo
    Succeeded,
    /// The unit of work failed and may have left an open transaction
    Failed,
}

/// A scoped transactional lease over one pooled connection
///
/// The scope guarantees the lease ends in exactly one of three terminal
/// states: restored to the idle set, restored after a rollback, or
/// invalidated. `finish` settles the lease explicitly; if the scope is
/// dropped unsettled (the caller's future was cancelled mid-work) the
/// connection is invalidated, since it may hold an open transaction.
pub struct TransactionScope<'a> {
    lease: Option<PooledConnection<'a>>,
}

impl<'a> TransactionScope<'a> {
    /// Wrap a lease in a scope
    pub fn new(lease: PooledConnection<'a>) -> Self {
        Self { lease: Some(lease) }
    }

    /// Get the leased connection
    pub fn connection(&self) -> &Arc<dyn RawConnection> {
        self.lease.as_ref().expect("scope already settled").inner()
    }

    /// Settle the lease according to the work's outcome
    ///
    /// 1. A connection that fails the liveness probe is invalidated, no
    ///    matter how the work went.
    /// 2. On success the connection goes straight back to the idle set.
    /// 3. On failure the connection is rolled back first, but only when
    ///    auto-commit is off (an explicit transaction was actually open).
    ///    Rollback errors are logged and ignored.
    pub async fn finish(mut self, outcome: WorkOutcome) {
        let Some(lease) = self.lease.take() else {
            return;
        };
        let connection = lease.inner().clone();

        if connection.ping().await.is_err() {
            tracing::warn!(
                connection_id = %lease.id(),
                "connection failed liveness probe on release"
            );
            lease.invalidate().await;
            return;
        }

        if outcome == WorkOutcome::Failed {
            // Probe failure is treated as auto-commit on: no rollback.
            let autocommit = connection.autocommit().await.unwrap_or(true);
            if !autocommit {
                tracing::debug!(
                    connection_id = %lease.id(),
                    "rolling back open transaction after failed work"
                );
                if let Err(err) = connection.rollback().await {
                    tracing::warn!(
                        connection_id = %lease.id(),
                        error = %err,
                        "rollback failed during scope release"
                    );
                }
            }
        }

        // Dropping the lease restores the connection to the idle set
        drop(lease);
    }
}

impl Drop for TransactionScope<'_> {
    fn drop(&mut self) {
        // Reached only when the scope future was dropped before settlement.
        // The connection may hold an open transaction, so it must not
        // re-enter the idle set.
        if let Some(lease) = self.lease.take() {
            tracing::warn!(
                connection_id = %lease.id(),
                "scope dropped unsettled, invalidating its connection"
            );
            lease.discard();
        }
    }
}
