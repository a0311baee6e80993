//! Scoped leases release on every exit path.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use nebula_pool::{Config, Pool, PoolBinding, Poolable};

#[derive(Debug, Clone, Default)]
struct Options {
    resets: Arc<AtomicU32>,
}

impl Config for Options {}

#[derive(Debug, thiserror::Error)]
#[error("unused")]
struct Never;

#[derive(Debug)]
struct UnitOfWork {
    staged: Vec<u32>,
    resets: Arc<AtomicU32>,
}

impl UnitOfWork {
    async fn flush(&mut self) -> usize {
        tokio::task::yield_now().await;
        self.staged.len()
    }
}

impl Poolable for UnitOfWork {
    type Config = Options;
    type Snapshot = ();
    type Error = Never;

    fn activate(options: &Options) -> Result<Self, Never> {
        Ok(Self {
            staged: Vec::new(),
            resets: Arc::clone(&options.resets),
        })
    }

    fn snapshot_configuration(&self) {}

    fn resurrect(&mut self, _snapshot: &()) {}

    fn reset(&mut self) -> Result<(), Never> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        self.staged.clear();
        Ok(())
    }

    fn set_pool(&mut self, _binding: Option<PoolBinding>) {}
}

fn pool() -> (Pool<UnitOfWork>, Arc<AtomicU32>) {
    let options = Options::default();
    let resets = Arc::clone(&options.resets);
    (Pool::with_max_size(options, 2).unwrap(), resets)
}

#[test]
fn with_lease_returns_closure_value_and_instance() {
    let (pool, resets) = pool();

    let staged = pool
        .with_lease(|uow| {
            uow.staged.extend([1, 2, 3]);
            uow.staged.len()
        })
        .unwrap();

    assert_eq!(staged, 3);
    assert_eq!(resets.load(Ordering::SeqCst), 1);
    assert_eq!(pool.stats().idle, 1);
    assert_eq!(pool.stats().leased, 0);
}

#[test]
fn early_return_inside_scope_still_releases() {
    let (pool, _resets) = pool();

    let found = pool
        .with_lease(|uow| {
            uow.staged.push(7);
            uow.staged.iter().find(|&&id| id == 7).copied()
        })
        .unwrap();
    assert_eq!(found, Some(7));

    let lease = pool.lease().unwrap();
    assert!(lease.is_reused());
    assert!(lease.staged.is_empty());
}

#[test]
fn panic_inside_scope_still_releases() {
    let (pool, resets) = pool();

    let result = catch_unwind(AssertUnwindSafe(|| {
        pool.with_lease(|uow| {
            uow.staged.push(1);
            assert!(uow.staged.is_empty(), "unit of work failed");
            uow.staged.len()
        })
    }));
    assert!(result.is_err());

    assert_eq!(resets.load(Ordering::SeqCst), 1);
    let stats = pool.stats();
    assert_eq!(stats.leased, 0);
    assert_eq!(stats.idle, 1);
}

#[tokio::test]
async fn with_lease_async_releases_after_await() {
    let (pool, resets) = pool();

    let flushed = pool
        .with_lease_async(async |uow: &mut UnitOfWork| {
            uow.staged.extend([10, 20]);
            uow.flush().await
        })
        .await
        .unwrap();

    assert_eq!(flushed, 2);
    assert_eq!(resets.load(Ordering::SeqCst), 1);
    assert_eq!(pool.stats().idle, 1);
}

#[test]
fn scoped_lease_after_teardown_fails_fast() {
    let (pool, resets) = pool();
    pool.dispose().unwrap();

    let mut ran = false;
    let result = pool.with_lease(|_| ran = true);
    assert!(result.is_err());
    assert!(!ran);
    assert_eq!(resets.load(Ordering::SeqCst), 0);
}
