//! Tests for the transaction scoping protocol

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tidepool_core::{ConnectionFactory, RawConnection, Result, TidepoolError};

use super::{TransactionScope, WorkOutcome};
use crate::manager::DatabasePool;
use crate::pool::PoolConfig;
use crate::retry::{BackoffStrategy, RetryPolicy};

/// Probe behavior shared by every connection a fake factory hands out
struct SharedState {
    healthy: AtomicBool,
    autocommit: AtomicBool,
    autocommit_probe_fails: AtomicBool,
    rollbacks: AtomicUsize,
}

impl SharedState {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            healthy: AtomicBool::new(true),
            autocommit: AtomicBool::new(true),
            autocommit_probe_fails: AtomicBool::new(false),
            rollbacks: AtomicUsize::new(0),
        })
    }
}

struct FakeConnection {
    state: Arc<SharedState>,
    closed: AtomicBool,
}

#[async_trait]
impl RawConnection for FakeConnection {
    fn driver_name(&self) -> &str {
        "fake"
    }

    async fn ping(&self) -> Result<()> {
        if self.state.healthy.load(Ordering::SeqCst) && !self.is_closed() {
            Ok(())
        } else {
            Err(TidepoolError::Connection("ping failed".into()))
        }
    }

    async fn autocommit(&self) -> Result<bool> {
        if self.state.autocommit_probe_fails.load(Ordering::SeqCst) {
            Err(TidepoolError::Connection("autocommit probe failed".into()))
        } else {
            Ok(self.state.autocommit.load(Ordering::SeqCst))
        }
    }

    async fn rollback(&self) -> Result<()> {
        self.state.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct FakeFactory {
    state: Arc<SharedState>,
    refuse_connects: AtomicBool,
    connections: Mutex<Vec<Arc<FakeConnection>>>,
}

impl FakeFactory {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: SharedState::new(),
            refuse_connects: AtomicBool::new(false),
            connections: Mutex::new(Vec::new()),
        })
    }

    /// Factory whose connections report auto-commit disabled
    /// (an explicit transaction open).
    fn autocommit_off() -> Arc<Self> {
        let factory = Self::new();
        factory.state.autocommit.store(false, Ordering::SeqCst);
        factory
    }

    fn state(&self) -> &SharedState {
        &self.state
    }

    fn rollbacks(&self) -> usize {
        self.state.rollbacks.load(Ordering::SeqCst)
    }

    fn created(&self) -> usize {
        self.connections.lock().len()
    }

    fn connection(&self, index: usize) -> Arc<FakeConnection> {
        self.connections.lock()[index].clone()
    }
}

#[async_trait]
impl ConnectionFactory for FakeFactory {
    async fn connect(&self) -> Result<Arc<dyn RawConnection>> {
        if self.refuse_connects.load(Ordering::SeqCst) {
            return Err(TidepoolError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        let conn = Arc::new(FakeConnection {
            state: self.state.clone(),
            closed: AtomicBool::new(false),
        });
        self.connections.lock().push(conn.clone());
        Ok(conn)
    }
}

/// Facade with no minimum floor and a long reap interval, so tests
/// control every connection that gets created.
fn test_pool(factory: Arc<FakeFactory>) -> DatabasePool {
    let config = PoolConfig::new(0, 2)
        .with_acquire_timeout_ms(1_000)
        .with_reap_interval_ms(60_000)
        .with_retry(RetryPolicy::new(1, BackoffStrategy::new(1, 2)));
    DatabasePool::new(config, factory)
}

#[tokio::test]
async fn test_success_restores_connection_without_rollback() {
    let factory = FakeFactory::new();
    let pool = test_pool(factory.clone());

    let value = pool
        .transaction(|_conn| async move { Ok(7) })
        .await
        .expect("transaction");

    assert_eq!(value, 7);
    assert_eq!(factory.rollbacks(), 0);
    assert_eq!(pool.stats().idle(), 1);
    assert!(!factory.connection(0).is_closed());
}

#[tokio::test]
async fn test_success_never_rolls_back_even_with_open_transaction() {
    let factory = FakeFactory::autocommit_off();
    let pool = test_pool(factory.clone());

    pool.transaction(|_conn| async move { Ok(()) })
        .await
        .expect("transaction");

    assert_eq!(factory.rollbacks(), 0);
    assert_eq!(pool.stats().idle(), 1);
}

#[tokio::test]
async fn test_failure_rolls_back_once_when_autocommit_off() {
    let factory = FakeFactory::autocommit_off();
    let pool = test_pool(factory.clone());

    let result: Result<()> = pool
        .transaction(|_conn| async move { Err(TidepoolError::Other("boom".into())) })
        .await;

    assert!(matches!(result, Err(TidepoolError::Other(_))));
    assert_eq!(factory.rollbacks(), 1);
    // Rolled back, restored, and reusable
    assert_eq!(pool.stats().idle(), 1);
    assert!(!factory.connection(0).is_closed());
}

#[tokio::test]
async fn test_failure_skips_rollback_when_autocommit_on() {
    let factory = FakeFactory::new();
    let pool = test_pool(factory.clone());

    let result: Result<()> = pool
        .transaction(|_conn| async move { Err(TidepoolError::Other("boom".into())) })
        .await;

    assert!(result.is_err());
    // Each statement committed on its own; nothing to undo
    assert_eq!(factory.rollbacks(), 0);
    assert_eq!(pool.stats().idle(), 1);
}

#[tokio::test]
async fn test_failure_skips_rollback_when_autocommit_probe_fails() {
    let factory = FakeFactory::autocommit_off();
    factory
        .state()
        .autocommit_probe_fails
        .store(true, Ordering::SeqCst);
    let pool = test_pool(factory.clone());

    let result: Result<()> = pool
        .transaction(|_conn| async move { Err(TidepoolError::Other("boom".into())) })
        .await;

    assert!(result.is_err());
    // Unknown auto-commit state: assume on, never roll back blind
    assert_eq!(factory.rollbacks(), 0);
    assert_eq!(pool.stats().idle(), 1);
}

#[tokio::test]
async fn test_invalid_connection_on_release_is_invalidated() {
    let factory = FakeFactory::new();
    let pool = test_pool(factory.clone());

    let state = factory.state.clone();
    pool.transaction(|_conn| async move {
        // The connection breaks while the work is using it
        state.healthy.store(false, Ordering::SeqCst);
        Ok(())
    })
    .await
    .expect("transaction");

    assert_eq!(pool.stats().total(), 0);
    assert!(factory.connection(0).is_closed());

    // The broken connection never reappears: the next checkout opens a new one
    factory.state().healthy.store(true, Ordering::SeqCst);
    pool.transaction(|_conn| async move { Ok(()) })
        .await
        .expect("transaction");
    assert_eq!(factory.created(), 2);
}

#[tokio::test]
async fn test_work_error_propagates_unchanged() {
    let factory = FakeFactory::new();
    let pool = test_pool(factory);

    let err = pool
        .transaction::<(), _, _>(|_conn| async move {
            Err(TidepoolError::Other("domain failure".into()))
        })
        .await
        .err()
        .expect("error");

    assert_eq!(err.to_string(), "domain failure");
}

#[tokio::test]
async fn test_acquisition_error_surfaces_to_caller() {
    let factory = FakeFactory::new();
    factory.refuse_connects.store(true, Ordering::SeqCst);
    let pool = test_pool(factory.clone());

    let result = pool.transaction(|_conn| async move { Ok(()) }).await;

    assert!(matches!(result, Err(TidepoolError::Io(_))));
    // The failed acquisition left no lease behind
    assert_eq!(pool.stats().total(), 0);
    assert_eq!(pool.stats().waiting(), 0);
}

#[tokio::test]
async fn test_panic_in_work_takes_failure_path() {
    let factory = FakeFactory::autocommit_off();
    let pool = test_pool(factory.clone());

    let task_pool = pool.clone();
    let result = tokio::spawn(async move {
        task_pool
            .transaction::<(), _, _>(|_conn| async move { panic!("work blew up") })
            .await
    })
    .await;

    assert!(result.expect_err("panic propagates").is_panic());
    // The panic settled the lease along the failure path
    assert_eq!(factory.rollbacks(), 1);
    assert_eq!(pool.stats().idle(), 1);
    assert!(!factory.connection(0).is_closed());
}

#[tokio::test]
async fn test_cancelled_transaction_invalidates_connection() {
    let factory = FakeFactory::autocommit_off();
    let pool = test_pool(factory.clone());

    let tx = pool.transaction(|_conn| async move {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    });
    let result = tokio::time::timeout(Duration::from_millis(50), tx).await;
    assert!(result.is_err());

    // An unsettled scope may hold an open transaction; it never goes back idle
    assert_eq!(pool.stats().total(), 0);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(factory.connection(0).is_closed());
}

#[tokio::test]
async fn test_manual_scope_settlement() {
    let factory = FakeFactory::new();
    let pool = test_pool(factory.clone());

    let lease = pool.acquire().await.expect("acquire");
    let scope = TransactionScope::new(lease);
    scope.connection().ping().await.expect("ping");
    scope.finish(WorkOutcome::Succeeded).await;

    assert_eq!(pool.stats().idle(), 1);
    assert_eq!(factory.rollbacks(), 0);
}

#[tokio::test]
async fn test_facade_invalidate_discards_lease() {
    let factory = FakeFactory::new();
    let pool = test_pool(factory.clone());

    let lease = pool.acquire().await.expect("acquire");
    pool.invalidate(lease).await;

    assert_eq!(pool.stats().total(), 0);
    assert!(factory.connection(0).is_closed());
}

#[tokio::test]
async fn test_concurrent_transactions_share_bounded_pool() {
    // min=1, max=2, short TTL: two transactions run concurrently, a third
    // waits for a release, and expired connections get replaced.
    let factory = FakeFactory::new();
    let config = PoolConfig::new(1, 2)
        .with_acquire_timeout_ms(2_000)
        .with_idle_ttl_ms(120)
        .with_reap_interval_ms(60_000)
        .with_retry(RetryPolicy::new(1, BackoffStrategy::new(1, 2)));
    let pool = DatabasePool::new(config, factory.clone());

    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..3 {
        let pool = pool.clone();
        let current = current.clone();
        let peak = peak.clone();
        handles.push(tokio::spawn(async move {
            pool.transaction(move |_conn| async move {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(30)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
            .await
        }));
    }
    for handle in handles {
        handle.await.expect("task").expect("transaction");
    }

    // Never more than two leases at once, and everything came back
    assert!(peak.load(Ordering::SeqCst) <= 2);
    let stats = pool.stats();
    assert_eq!(stats.leased(), 0);
    assert!(stats.idle() <= 2);

    // After the TTL elapses, idle connections are evicted and replaced
    tokio::time::sleep(Duration::from_millis(200)).await;
    let before = factory.created();
    pool.transaction(|_conn| async move { Ok(()) })
        .await
        .expect("transaction");
    assert!(factory.created() > before);
    for index in 0..before {
        assert!(factory.connection(index).is_closed());
    }
}
