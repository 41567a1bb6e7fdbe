//! Connection pool implementation

use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use uuid::Uuid;

use tidepool_core::{ConnectionFactory, RawConnection, Result, TidepoolError};

use super::config::PoolConfig;
use super::stats::PoolStats;

/// An idle connection parked in the pool with its lifecycle metadata
struct IdleEntry {
    connection: Arc<dyn RawConnection>,
    id: Uuid,
    created_at: Instant,
    idle_since: Instant,
}

/// Decrements the waiter counter when an acquire attempt ends,
/// including when the caller cancels the acquire future.
struct WaitGuard<'a>(&'a AtomicUsize);

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A bounded pool of database connections
///
/// The pool creates connections lazily up to `max_size`, parks returned
/// connections in an idle set, and blocks acquirers when every slot is
/// leased out. Connections idle longer than the configured time-to-live are
/// evicted, and broken connections can be permanently invalidated, freeing
/// their slot for a fresh replacement.
pub struct ResourcePool {
    /// Pool configuration
    config: PoolConfig,
    /// Connection factory
    factory: Arc<dyn ConnectionFactory>,
    /// Available idle connections
    idle: Mutex<VecDeque<IdleEntry>>,
    /// Semaphore bounding the number of live connections
    semaphore: Arc<Semaphore>,
    /// Number of connections currently leased out
    leased_count: AtomicUsize,
    /// Number of callers waiting for a connection
    waiting_count: AtomicUsize,
    /// Whether the pool has been shut down
    closed: AtomicBool,
}

impl ResourcePool {
    /// Create a new pool with the given configuration and factory
    pub fn new<F: ConnectionFactory>(config: PoolConfig, factory: F) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_size()));
        Self {
            config,
            factory: Arc::new(factory),
            idle: Mutex::new(VecDeque::new()),
            semaphore,
            leased_count: AtomicUsize::new(0),
            waiting_count: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Acquire a connection from the pool
    ///
    /// This will:
    /// 1. Reserve a slot, blocking while every slot is leased out
    /// 2. Hand out an idle connection if a usable one exists, evicting
    ///    entries past their idle time-to-live or failing the liveness
    ///    probe along the way
    /// 3. Otherwise open a new connection through the retry policy
    ///
    /// Returns an error if the acquire timeout elapses, if the connect
    /// operation exhausts its retry budget, or if the pool is closed.
    /// Cancelling the returned future never consumes a slot.
    pub async fn acquire(&self) -> Result<PooledConnection<'_>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TidepoolError::Closed);
        }

        self.waiting_count.fetch_add(1, Ordering::SeqCst);
        let _waiting = WaitGuard(&self.waiting_count);

        match tokio::time::timeout(self.config.acquire_timeout(), self.acquire_slot()).await {
            Ok(lease) => lease,
            Err(_) => Err(TidepoolError::Timeout(format!(
                "timed out waiting for a connection after {:?}",
                self.config.acquire_timeout()
            ))),
        }
    }

    async fn acquire_slot(&self) -> Result<PooledConnection<'_>> {
        // The permit reserves a slot; waiters park here until a lease is
        // released or invalidated. Dropping the future drops the permit.
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| TidepoolError::Closed)?;

        let (connection, id, created_at) = match self.checkout_idle().await {
            Some(entry) => entry,
            None => {
                // Slot is already reserved, so the network round-trips run
                // without holding the idle lock.
                let connection = self
                    .config
                    .retry()
                    .run(|| self.factory.connect())
                    .await?;
                let id = Uuid::new_v4();
                tracing::debug!(
                    connection_id = %id,
                    driver = connection.driver_name(),
                    "opened new connection"
                );
                (connection, id, Instant::now())
            }
        };

        self.leased_count.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(connection_id = %id, "connection leased");

        Ok(PooledConnection {
            connection: Some(connection),
            id,
            created_at,
            pool: self,
            _permit: permit,
        })
    }

    /// Pop idle entries until one is usable, closing the ones that are
    /// past their time-to-live, already dead, or failing the liveness probe.
    async fn checkout_idle(&self) -> Option<(Arc<dyn RawConnection>, Uuid, Instant)> {
        loop {
            let entry = { self.idle.lock().pop_front() };

            match entry {
                Some(entry) => {
                    if entry.idle_since.elapsed() > self.config.idle_ttl() {
                        tracing::debug!(
                            connection_id = %entry.id,
                            "closing idle connection past its time-to-live"
                        );
                        let _ = entry.connection.close().await;
                        continue;
                    }

                    if entry.connection.is_closed() {
                        tracing::debug!(
                            connection_id = %entry.id,
                            "discarding idle connection that reports closed"
                        );
                        let _ = entry.connection.close().await;
                        continue;
                    }

                    // A connection dropped server-side while parked still
                    // reports open locally; only the probe catches it.
                    if entry.connection.ping().await.is_err() {
                        tracing::debug!(
                            connection_id = %entry.id,
                            "closing idle connection that failed its liveness probe"
                        );
                        let _ = entry.connection.close().await;
                        continue;
                    }

                    return Some((entry.connection, entry.id, entry.created_at));
                }
                None => return None,
            }
        }
    }

    /// Return a connection to the idle set
    ///
    /// Called from the lease guard's drop. The idle entry is pushed before
    /// the guard releases its permit, so the next permit holder always
    /// observes the returned connection.
    fn return_connection(&self, connection: Arc<dyn RawConnection>, id: Uuid, created_at: Instant) {
        self.leased_count.fetch_sub(1, Ordering::SeqCst);

        if self.closed.load(Ordering::SeqCst) || connection.is_closed() {
            tracing::debug!(connection_id = %id, "dropping returned connection");
            close_detached(connection);
            return;
        }

        tracing::debug!(connection_id = %id, "connection restored to idle set");
        let mut idle = self.idle.lock();
        idle.push_back(IdleEntry {
            connection,
            id,
            created_at,
            idle_since: Instant::now(),
        });
    }

    /// Account for a leased connection leaving the pool permanently
    fn remove_lease(&self, id: Uuid) {
        self.leased_count.fetch_sub(1, Ordering::SeqCst);
        tracing::warn!(connection_id = %id, "connection invalidated");
    }

    /// Evict idle connections past their time-to-live, then top the pool
    /// back up to its minimum size (best effort).
    ///
    /// The pool also evicts lazily on acquire; this is the body of the
    /// periodic reaper pass.
    pub async fn evict_expired(&self) {
        let ttl = self.config.idle_ttl();
        let expired: Vec<IdleEntry> = {
            let mut idle = self.idle.lock();
            let mut keep = VecDeque::with_capacity(idle.len());
            let mut out = Vec::new();
            while let Some(entry) = idle.pop_front() {
                if entry.idle_since.elapsed() > ttl {
                    out.push(entry);
                } else {
                    keep.push_back(entry);
                }
            }
            *idle = keep;
            out
        };

        for entry in expired {
            tracing::debug!(connection_id = %entry.id, "evicting idle connection past its time-to-live");
            if let Err(err) = entry.connection.close().await {
                tracing::warn!(connection_id = %entry.id, error = %err, "error closing evicted connection");
            }
        }

        self.replenish_min().await;
    }

    /// Create connections until the pool holds `min_size` live ones.
    ///
    /// Never blocks on a slot: replenishment only uses slots no caller
    /// wants. Stops on the first creation failure.
    async fn replenish_min(&self) {
        while !self.closed.load(Ordering::SeqCst) {
            let live = self.idle.lock().len() + self.leased_count.load(Ordering::SeqCst);
            if live >= self.config.min_size() {
                break;
            }

            let permit = match self.semaphore.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => break,
            };

            match self.factory.connect().await {
                Ok(connection) => {
                    let id = Uuid::new_v4();
                    tracing::debug!(
                        connection_id = %id,
                        "opened connection to maintain minimum pool size"
                    );
                    let now = Instant::now();
                    self.idle.lock().push_back(IdleEntry {
                        connection,
                        id,
                        created_at: now,
                        idle_since: now,
                    });
                    // Entry is visible before the slot frees
                    drop(permit);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "failed to replenish pool to minimum size");
                    break;
                }
            }
        }
    }

    /// Get current pool statistics
    pub fn stats(&self) -> PoolStats {
        let idle = self.idle.lock().len();
        let leased = self.leased_count.load(Ordering::SeqCst);
        let waiting = self.waiting_count.load(Ordering::SeqCst);
        PoolStats::new(idle + leased, idle, leased, waiting)
    }

    /// Get the pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Check if the pool has been shut down
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Shut the pool down
    ///
    /// Wakes every blocked acquirer with an error, closes all idle
    /// connections, and closes leased connections as they come back.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.semaphore.close();

        let drained: Vec<IdleEntry> = { self.idle.lock().drain(..).collect() };
        for entry in drained {
            if let Err(err) = entry.connection.close().await {
                tracing::warn!(connection_id = %entry.id, error = %err, "error closing connection during shutdown");
            }
        }

        tracing::debug!("connection pool closed");
    }
}

/// Close a connection from a sync context.
///
/// Teardown failures are absorbed; they must not block slot accounting.
fn close_detached(connection: Arc<dyn RawConnection>) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                let _ = connection.close().await;
            });
        }
        Err(_) => {
            tracing::warn!("no runtime available, dropping connection without closing it");
        }
    }
}

/// A connection leased from the pool
///
/// The lease holds one of the pool's slots for its whole lifetime. Dropping
/// the lease returns the connection to the idle set; `invalidate` removes
/// it permanently instead, allowing the pool to create a replacement.
pub struct PooledConnection<'a> {
    connection: Option<Arc<dyn RawConnection>>,
    id: Uuid,
    created_at: Instant,
    pool: &'a ResourcePool,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledConnection<'_> {
    type Target = dyn RawConnection;

    fn deref(&self) -> &Self::Target {
        self.connection.as_ref().expect("connection taken").as_ref()
    }
}

impl PooledConnection<'_> {
    /// Get the underlying connection as an Arc
    pub fn inner(&self) -> &Arc<dyn RawConnection> {
        self.connection.as_ref().expect("connection taken")
    }

    /// Get the unique identifier for this connection
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// When the underlying connection was opened
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Permanently remove this connection from the pool and close it
    ///
    /// The connection never re-enters the idle set; dropping the lease
    /// frees its slot so a future acquire can create a replacement.
    /// Close failures are logged and ignored.
    pub async fn invalidate(mut self) {
        if let Some(connection) = self.connection.take() {
            self.pool.remove_lease(self.id);
            if let Err(err) = connection.close().await {
                tracing::warn!(connection_id = %self.id, error = %err, "error closing invalidated connection");
            }
        }
    }

    /// Remove this connection from the pool without awaiting its close.
    ///
    /// Used when a lease must be torn down from a sync context (an
    /// unsettled scope being dropped).
    pub(crate) fn discard(mut self) {
        if let Some(connection) = self.connection.take() {
            self.pool.remove_lease(self.id);
            close_detached(connection);
        }
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            // Push to the idle set first; the permit field drops after,
            // so whoever wins the freed slot sees this connection.
            self.pool.return_connection(connection, self.id, self.created_at);
        }
    }
}
