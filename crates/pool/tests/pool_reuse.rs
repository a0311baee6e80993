//! Reuse path: a returned instance comes back resurrected, not rebuilt.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use nebula_pool::{Config, Pool, PoolBinding, PoolConfig, Poolable};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Probe {
    constructed: AtomicU32,
    snapshots: AtomicU32,
    resurrections: AtomicU32,
    resets: AtomicU32,
}

#[derive(Debug, Clone)]
struct ContextOptions {
    database: &'static str,
    probe: Arc<Probe>,
}

impl Config for ContextOptions {}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Steady {
    database: &'static str,
    lazy_loading: bool,
}

#[derive(Debug, thiserror::Error)]
#[error("unused")]
struct Never;

#[derive(Debug)]
struct DbContext {
    id: u32,
    database: &'static str,
    lazy_loading: bool,
    tracked: Vec<String>,
    fresh: bool,
    pool: Option<PoolBinding>,
    probe: Arc<Probe>,
}

impl Poolable for DbContext {
    type Config = ContextOptions;
    type Snapshot = Steady;
    type Error = Never;

    fn activate(options: &ContextOptions) -> Result<Self, Never> {
        let id = options.probe.constructed.fetch_add(1, Ordering::SeqCst);
        Ok(Self {
            id,
            database: options.database,
            lazy_loading: true,
            tracked: Vec::new(),
            fresh: true,
            pool: None,
            probe: Arc::clone(&options.probe),
        })
    }

    fn snapshot_configuration(&self) -> Steady {
        self.probe.snapshots.fetch_add(1, Ordering::SeqCst);
        Steady {
            database: self.database,
            lazy_loading: self.lazy_loading,
        }
    }

    fn resurrect(&mut self, snapshot: &Steady) {
        self.probe.resurrections.fetch_add(1, Ordering::SeqCst);
        self.database = snapshot.database;
        self.lazy_loading = snapshot.lazy_loading;
        self.fresh = false;
    }

    fn reset(&mut self) -> Result<(), Never> {
        self.probe.resets.fetch_add(1, Ordering::SeqCst);
        self.tracked.clear();
        Ok(())
    }

    fn set_pool(&mut self, binding: Option<PoolBinding>) {
        self.pool = binding;
    }
}

fn options() -> (ContextOptions, Arc<Probe>) {
    let probe = Arc::new(Probe::default());
    (
        ContextOptions {
            database: "orders",
            probe: Arc::clone(&probe),
        },
        probe,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn rent_return_rent_yields_same_instance_resurrected() {
    let (options, probe) = options();
    let pool = Pool::<DbContext>::new(options, PoolConfig::with_max_size(2)).unwrap();

    let a = pool.rent().unwrap();
    let a_id = a.id;
    assert!(a.fresh);
    pool.return_resource(a).unwrap();

    let again = pool.rent().unwrap();
    assert_eq!(again.id, a_id, "should reuse the returned instance");
    assert!(!again.fresh, "reused instance is resurrected, not fresh");
    assert!(again.is_reused());
    assert_eq!(probe.constructed.load(Ordering::SeqCst), 1);
    assert_eq!(probe.resurrections.load(Ordering::SeqCst), 1);
    assert_eq!(probe.resets.load(Ordering::SeqCst), 1);
}

#[test]
fn per_use_state_does_not_leak_between_leases() {
    let (options, _probe) = options();
    let pool = Pool::<DbContext>::new(options, PoolConfig::default()).unwrap();

    {
        let mut ctx = pool.rent().unwrap();
        ctx.tracked.push("order#1".to_string());
        ctx.lazy_loading = false;
        ctx.database = "scratch";
    }

    let ctx = pool.rent().unwrap();
    assert!(ctx.tracked.is_empty(), "reset clears tracked entities");
    assert!(ctx.lazy_loading, "resurrect restores the snapshot");
    assert_eq!(ctx.database, "orders");
}

#[test]
fn snapshot_taken_once_from_first_instance() {
    let (options, probe) = options();
    let pool = Pool::<DbContext>::new(options, PoolConfig::default()).unwrap();

    let a = pool.rent().unwrap();
    let b = pool.rent().unwrap();
    let c = pool.rent().unwrap();
    drop((a, b, c));
    for _ in 0..5 {
        drop(pool.rent().unwrap());
    }

    assert_eq!(probe.constructed.load(Ordering::SeqCst), 3);
    assert_eq!(probe.snapshots.load(Ordering::SeqCst), 1);
    assert_eq!(
        pool.snapshot(),
        Some(&Steady {
            database: "orders",
            lazy_loading: true
        })
    );
}

#[test]
fn pooled_instance_keeps_back_reference_while_idle() {
    let (options, _probe) = options();
    let pool = Pool::<DbContext>::new(options, PoolConfig::default()).unwrap();

    drop(pool.rent().unwrap());
    let ctx = pool.rent().unwrap();
    assert_eq!(ctx.pool.as_ref().map(PoolBinding::pool_id), Some(pool.id()));
}

#[test]
fn distinct_live_leases_hold_distinct_instances() {
    let (options, _probe) = options();
    let pool = Pool::<DbContext>::new(options, PoolConfig::with_max_size(4)).unwrap();

    let leases: Vec<_> = (0..4).map(|_| pool.rent().unwrap()).collect();
    let mut ids: Vec<u32> = leases.iter().map(|lease| lease.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 4);

    drop(leases);
    let again: Vec<_> = (0..4).map(|_| pool.rent().unwrap()).collect();
    assert!(again.iter().all(|lease| lease.is_reused()));
    assert_eq!(pool.stats().created, 4);
}
