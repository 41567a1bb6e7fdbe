//! Connection capability traits

use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// The capability surface the pool requires from a live database connection.
///
/// The actual wire driver is opaque to the pool. To manage a connection's
/// lifecycle the pool only needs a liveness probe, the auto-commit flag,
/// rollback, and close. All probes are fallible: a connection that cannot
/// prove it is healthy is discarded rather than reused.
#[async_trait]
pub trait RawConnection: Send + Sync {
    /// Get the driver name for diagnostics (e.g., "postgresql", "sqlite")
    fn driver_name(&self) -> &str;

    /// Probe whether the connection is still usable.
    ///
    /// Any error from the probe means the connection is unusable.
    async fn ping(&self) -> Result<()>;

    /// Whether the connection is currently in auto-commit mode.
    ///
    /// `false` means an explicit transaction is open on the connection.
    async fn autocommit(&self) -> Result<bool>;

    /// Roll back the open transaction, if any
    async fn rollback(&self) -> Result<()>;

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    ///
    /// Must be cheap; the pool calls this on every checkout and return.
    fn is_closed(&self) -> bool;
}

/// Factory for opening new physical connections.
///
/// This is the caller-supplied boundary around the wire driver. The pool
/// wraps `connect` in its retry policy and makes no assumptions about the
/// underlying protocol.
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// Open a new connection
    async fn connect(&self) -> Result<Arc<dyn RawConnection>>;
}

#[async_trait]
impl<T: ConnectionFactory> ConnectionFactory for Arc<T> {
    async fn connect(&self) -> Result<Arc<dyn RawConnection>> {
        (**self).connect().await
    }
}
