//! Resource pool: bounded, lock-free reuse of [`Poolable`] instances.
//!
//! Idle instances live in a `crossbeam` `SegQueue`; capacity is enforced by a
//! single atomic slot counter. No mutex is taken on the rent or return path.
//!
//! Accounting: `idle` counts slots claimed by returned instances and is the
//! only value compared against `max_size`. `leased` counts instances on loan.
//! Their sum is the pool's outstanding count.

use std::any::type_name;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use crossbeam::queue::SegQueue;

use crate::activator::Activator;
use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crate::events::{DisposeReason, EventBus, PoolEvent};
use crate::lease::Lease;
use crate::poolable::{PoolBinding, PoolId, Poolable};

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// A pooled instance plus the pool's view of its back-reference.
pub(crate) struct Entry<T> {
    pub(crate) resource: T,
    bound: bool,
}

impl<T: Poolable> Entry<T> {
    fn bind(mut resource: T, pool_id: PoolId) -> Self {
        resource.set_pool(Some(PoolBinding::new(pool_id)));
        Self {
            resource,
            bound: true,
        }
    }

    pub(crate) fn unbind(&mut self) {
        if self.bound {
            self.resource.set_pool(None);
            self.bound = false;
        }
    }
}

// ---------------------------------------------------------------------------
// PoolStats
// ---------------------------------------------------------------------------

/// Point-in-time pool statistics.
///
/// Counters are read individually; under concurrent traffic the fields may
/// come from slightly different instants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Current capacity (zero once torn down).
    pub max_size: usize,
    /// Idle slots currently claimed.
    pub idle: usize,
    /// Instances currently on loan.
    pub leased: usize,
    /// `idle + leased`.
    pub outstanding: usize,
    /// Total instances ever constructed.
    pub created: u64,
    /// Total rents served from the idle queue.
    pub reused: u64,
    /// Total instances reset and re-enqueued.
    pub returned: u64,
    /// Total instances permanently retired.
    pub disposed: u64,
}

#[derive(Default)]
struct Counters {
    created: AtomicU64,
    reused: AtomicU64,
    returned: AtomicU64,
    disposed: AtomicU64,
}

// ---------------------------------------------------------------------------
// Shared
// ---------------------------------------------------------------------------

/// Inner shared state for the pool.
pub(crate) struct Shared<T: Poolable> {
    id: PoolId,
    activator: Activator<T>,
    /// Captured from the first instance this pool constructs.
    snapshot: OnceLock<T::Snapshot>,
    idle: SegQueue<Entry<T>>,
    idle_count: AtomicUsize,
    leased: AtomicUsize,
    max_size: AtomicUsize,
    disposed: AtomicBool,
    counters: Counters,
    events: OnceLock<Arc<EventBus>>,
}

enum Admission<'a, T: Poolable> {
    Accepted(PendingReturn<'a, T>),
    Rejected(Entry<T>),
}

impl<T: Poolable> Shared<T> {
    pub(crate) fn id(&self) -> PoolId {
        self.id
    }

    fn emit(&self, event: PoolEvent) {
        if let Some(bus) = self.events.get() {
            bus.emit(event);
        }
    }

    fn rent(self: &Arc<Self>) -> Result<Lease<T>> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(Error::Disposed {
                resource: type_name::<T>(),
            });
        }

        let (entry, reused) = match self.idle.pop() {
            Some(mut entry) => {
                self.idle_count.fetch_sub(1, Ordering::AcqRel);
                if let Some(snapshot) = self.snapshot.get() {
                    entry.resource.resurrect(snapshot);
                }
                self.counters.reused.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    pool_id = %self.id,
                    resource = type_name::<T>(),
                    idle = self.idle_count.load(Ordering::Relaxed),
                    "Reusing pooled instance"
                );
                (entry, true)
            }
            None => {
                let resource = self.activator.activate()?;
                self.snapshot
                    .get_or_init(|| resource.snapshot_configuration());
                self.counters.created.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    pool_id = %self.id,
                    resource = type_name::<T>(),
                    "Constructed pooled instance"
                );
                self.emit(PoolEvent::Created { pool_id: self.id });
                (Entry::bind(resource, self.id), false)
            }
        };

        self.leased.fetch_add(1, Ordering::AcqRel);
        self.emit(PoolEvent::Rented {
            pool_id: self.id,
            reused,
        });
        Ok(Lease::new(entry, reused, Arc::clone(self)))
    }

    /// Claim an idle slot. The post-increment value is the single point
    /// where concurrent returns near capacity are serialized.
    fn claim_slot(&self) -> bool {
        let claimed = self.idle_count.fetch_add(1, Ordering::AcqRel) + 1;
        if claimed <= self.max_size.load(Ordering::SeqCst) {
            return true;
        }
        self.release_slot();
        false
    }

    fn release_slot(&self) {
        self.idle_count.fetch_sub(1, Ordering::AcqRel);
    }

    fn admit(&self, entry: Entry<T>) -> Admission<'_, T> {
        self.leased.fetch_sub(1, Ordering::AcqRel);
        if entry.bound && self.claim_slot() {
            Admission::Accepted(PendingReturn {
                shared: self,
                entry: Some(entry),
            })
        } else {
            Admission::Rejected(entry)
        }
    }

    /// Enqueue a successfully reset instance, or hand it back with the
    /// wrapped reset error after releasing its slot.
    fn settle(
        &self,
        mut pending: PendingReturn<'_, T>,
        outcome: std::result::Result<(), T::Error>,
    ) -> std::result::Result<(), (Entry<T>, Error)> {
        let Some(entry) = pending.entry.take() else {
            return Ok(());
        };
        match outcome {
            Ok(()) => {
                self.enqueue(entry);
                Ok(())
            }
            Err(err) => {
                self.release_slot();
                Err((entry, Error::reset(type_name::<T>(), err)))
            }
        }
    }

    fn enqueue(&self, entry: Entry<T>) {
        self.idle.push(entry);
        self.counters.returned.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            pool_id = %self.id,
            resource = type_name::<T>(),
            idle = self.idle_count.load(Ordering::Relaxed),
            max_size = self.max_size.load(Ordering::Relaxed),
            "Returned instance to pool"
        );
        self.emit(PoolEvent::Returned { pool_id: self.id });

        // A return that claimed its slot before teardown may land after the
        // drain; sweep it here.
        if self.disposed.load(Ordering::SeqCst) {
            let (_, err) = self.drain(DisposeReason::Teardown);
            if let Some(err) = err {
                tracing::warn!(pool_id = %self.id, error = %err, "Late teardown dispose failed");
            }
        }
    }

    pub(crate) fn return_entry(&self, entry: Entry<T>) -> Result<()> {
        match self.admit(entry) {
            Admission::Rejected(entry) => self.retire(entry, DisposeReason::Overflow),
            Admission::Accepted(mut pending) => {
                let outcome = match pending.entry.as_mut() {
                    Some(entry) => entry.resource.reset(),
                    None => Ok(()),
                };
                self.settle(pending, outcome).or_else(|(entry, err)| {
                    self.retire_quietly(entry, DisposeReason::ResetFailed);
                    Err(err)
                })
            }
        }
    }

    pub(crate) async fn return_entry_async(&self, entry: Entry<T>) -> Result<()> {
        match self.admit(entry) {
            Admission::Rejected(entry) => self.retire_async(entry, DisposeReason::Overflow).await,
            Admission::Accepted(mut pending) => {
                let outcome = match pending.entry.as_mut() {
                    Some(entry) => entry.resource.reset_async().await,
                    None => Ok(()),
                };
                match self.settle(pending, outcome) {
                    Ok(()) => Ok(()),
                    Err((entry, err)) => {
                        if let Err(dispose_err) =
                            self.retire_async(entry, DisposeReason::ResetFailed).await
                        {
                            tracing::warn!(
                                pool_id = %self.id,
                                error = %dispose_err,
                                "Dispose after failed reset failed"
                            );
                        }
                        Err(err)
                    }
                }
            }
        }
    }

    pub(crate) fn detach(&self, entry: &mut Entry<T>) {
        entry.unbind();
        self.leased.fetch_sub(1, Ordering::AcqRel);
        self.emit(PoolEvent::Detached { pool_id: self.id });
    }

    fn note_disposed(&self, reason: DisposeReason) {
        self.counters.disposed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            pool_id = %self.id,
            resource = type_name::<T>(),
            %reason,
            "Disposing pooled instance"
        );
        self.emit(PoolEvent::Disposed {
            pool_id: self.id,
            reason,
        });
    }

    fn retire(&self, mut entry: Entry<T>, reason: DisposeReason) -> Result<()> {
        entry.unbind();
        self.note_disposed(reason);
        entry
            .resource
            .dispose()
            .map_err(|err| Error::dispose(type_name::<T>(), err))
    }

    async fn retire_async(&self, mut entry: Entry<T>, reason: DisposeReason) -> Result<()> {
        entry.unbind();
        self.note_disposed(reason);
        entry
            .resource
            .dispose_async()
            .await
            .map_err(|err| Error::dispose(type_name::<T>(), err))
    }

    /// Retire on a path that has no caller to report a dispose failure to.
    fn retire_quietly(&self, entry: Entry<T>, reason: DisposeReason) {
        if let Err(err) = self.retire(entry, reason) {
            tracing::warn!(pool_id = %self.id, %reason, error = %err, "Dispose failed");
        }
    }

    /// Retire every idle instance. Returns the count and the first dispose
    /// error; later errors are logged.
    fn drain(&self, reason: DisposeReason) -> (usize, Option<Error>) {
        let mut drained = 0;
        let mut first_err = None;
        while let Some(entry) = self.idle.pop() {
            self.release_slot();
            drained += 1;
            if let Err(err) = self.retire(entry, reason) {
                keep_first(&mut first_err, err, self.id);
            }
        }
        (drained, first_err)
    }

    async fn drain_async(&self, reason: DisposeReason) -> (usize, Option<Error>) {
        let mut drained = 0;
        let mut first_err = None;
        while let Some(entry) = self.idle.pop() {
            self.release_slot();
            drained += 1;
            if let Err(err) = self.retire_async(entry, reason).await {
                keep_first(&mut first_err, err, self.id);
            }
        }
        (drained, first_err)
    }

    /// Returns `true` for the call that actually performed the teardown.
    fn begin_teardown(&self) -> bool {
        let first = !self.disposed.swap(true, Ordering::SeqCst);
        self.max_size.store(0, Ordering::SeqCst);
        first
    }

    fn finish_teardown(&self, first: bool, drained: usize, err: Option<Error>) -> Result<()> {
        if first {
            tracing::debug!(
                pool_id = %self.id,
                resource = type_name::<T>(),
                drained,
                leased = self.leased.load(Ordering::Acquire),
                "Pool torn down"
            );
            self.emit(PoolEvent::TornDown {
                pool_id: self.id,
                drained,
            });
        }
        err.map_or(Ok(()), Err)
    }

    fn stats(&self) -> PoolStats {
        let idle = self.idle_count.load(Ordering::Acquire);
        let leased = self.leased.load(Ordering::Acquire);
        PoolStats {
            max_size: self.max_size.load(Ordering::SeqCst),
            idle,
            leased,
            outstanding: idle + leased,
            created: self.counters.created.load(Ordering::Relaxed),
            reused: self.counters.reused.load(Ordering::Relaxed),
            returned: self.counters.returned.load(Ordering::Relaxed),
            disposed: self.counters.disposed.load(Ordering::Relaxed),
        }
    }
}

fn keep_first(slot: &mut Option<Error>, err: Error, pool_id: PoolId) {
    if slot.is_none() {
        *slot = Some(err);
    } else {
        tracing::warn!(%pool_id, error = %err, "Dispose failed during drain");
    }
}

impl<T: Poolable> Drop for Shared<T> {
    fn drop(&mut self) {
        let (drained, err) = self.drain(DisposeReason::PoolDropped);
        if let Some(err) = err {
            tracing::warn!(pool_id = %self.id, drained, error = %err, "Dispose failed on pool drop");
        }
    }
}

/// An instance whose slot is claimed but whose reset has not finished.
///
/// Dropping it before [`Shared::settle`] (a cancelled async return, or a
/// panicking reset) gives the slot back and disposes the instance, so a
/// partially reset instance is never reused.
struct PendingReturn<'a, T: Poolable> {
    shared: &'a Shared<T>,
    entry: Option<Entry<T>>,
}

impl<T: Poolable> Drop for PendingReturn<'_, T> {
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take() {
            self.shared.release_slot();
            self.shared.retire_quietly(entry, DisposeReason::Cancelled);
        }
    }
}

// ---------------------------------------------------------------------------
// Pool<T>
// ---------------------------------------------------------------------------

/// Bounded pool of reusable `T` instances.
///
/// Cheap to clone; all clones share the same idle queue and counters.
pub struct Pool<T: Poolable> {
    shared: Arc<Shared<T>>,
}

impl<T: Poolable> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Poolable> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("id", &self.shared.id)
            .field("resource", &type_name::<T>())
            .field("stats", &self.shared.stats())
            .finish()
    }
}

impl<T: Poolable> Pool<T> {
    /// Create a pool that activates `T` from `config`.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] if `config` fails validation.
    pub fn new(config: T::Config, pool_config: PoolConfig) -> Result<Self> {
        Ok(Self::with_activator(Activator::new(config)?, pool_config))
    }

    /// Create a pool with the given capacity.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] if `config` fails validation.
    pub fn with_max_size(config: T::Config, max_size: usize) -> Result<Self> {
        Self::new(config, PoolConfig::with_max_size(max_size))
    }

    /// Create a pool around an existing activator.
    pub fn with_activator(activator: Activator<T>, pool_config: PoolConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: PoolId::new(),
                activator,
                snapshot: OnceLock::new(),
                idle: SegQueue::new(),
                idle_count: AtomicUsize::new(0),
                leased: AtomicUsize::new(0),
                max_size: AtomicUsize::new(pool_config.max_size),
                disposed: AtomicBool::new(false),
                counters: Counters::default(),
                events: OnceLock::new(),
            }),
        }
    }

    /// Publish this pool's events on `bus`.
    ///
    /// Only the first attached bus is used.
    pub fn with_event_bus(self, bus: Arc<EventBus>) -> Self {
        if self.shared.events.set(bus).is_err() {
            tracing::debug!(pool_id = %self.shared.id, "Event bus already attached");
        }
        self
    }

    /// Identity of this pool.
    #[must_use]
    pub fn id(&self) -> PoolId {
        self.shared.id
    }

    /// Current capacity.
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.shared.max_size.load(Ordering::SeqCst)
    }

    /// Whether [`Pool::dispose`] has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::SeqCst)
    }

    /// The configuration snapshot, once the first instance was constructed.
    #[must_use]
    pub fn snapshot(&self) -> Option<&T::Snapshot> {
        self.shared.snapshot.get()
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.shared.stats()
    }

    /// Rent an instance.
    ///
    /// Reuses an idle instance (resurrected from the pool's snapshot) when
    /// one is available, otherwise constructs a new one.
    ///
    /// # Errors
    /// [`Error::Disposed`] after teardown; [`Error::Activation`] if
    /// construction fails.
    pub fn rent(&self) -> Result<Lease<T>> {
        self.shared.rent()
    }

    /// Rent an instance for a unit of work; see [`Pool::rent`].
    pub fn lease(&self) -> Result<Lease<T>> {
        self.rent()
    }

    /// Return a leased instance. Equivalent to [`Lease::release`].
    ///
    /// The lease always goes back to the pool that issued it.
    pub fn return_resource(&self, lease: Lease<T>) -> Result<()> {
        debug_assert_eq!(lease.pool_id(), self.id(), "lease returned to a foreign pool");
        lease.release()
    }

    /// Suspend-capable [`Pool::return_resource`].
    pub async fn return_resource_async(&self, lease: Lease<T>) -> Result<()> {
        debug_assert_eq!(lease.pool_id(), self.id(), "lease returned to a foreign pool");
        lease.release_async().await
    }

    /// Run `f` on a leased instance and return it afterwards.
    ///
    /// The instance goes back to the pool even if `f` panics.
    ///
    /// # Errors
    /// Rent errors, or [`Error::Reset`] if the instance could not be reset.
    pub fn with_lease<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut T) -> R,
    {
        let mut lease = self.rent()?;
        let out = f(&mut *lease);
        lease.release()?;
        Ok(out)
    }

    /// Async [`Pool::with_lease`]; the instance is returned through
    /// [`Lease::release_async`].
    pub async fn with_lease_async<F, R>(&self, f: F) -> Result<R>
    where
        F: AsyncFnOnce(&mut T) -> R,
    {
        let mut lease = self.rent()?;
        let out = f(&mut *lease).await;
        lease.release_async().await?;
        Ok(out)
    }

    /// Tear the pool down.
    ///
    /// Capacity drops to zero, idle instances are disposed and further rents
    /// fail with [`Error::Disposed`]. Instances on loan are disposed when
    /// their lease is released. Calling this again is a no-op.
    ///
    /// # Errors
    /// The first dispose failure; every idle instance is retired regardless.
    pub fn dispose(&self) -> Result<()> {
        let first = self.shared.begin_teardown();
        let (drained, err) = self.shared.drain(DisposeReason::Teardown);
        self.shared.finish_teardown(first, drained, err)
    }

    /// Suspend-capable [`Pool::dispose`].
    pub async fn dispose_async(&self) -> Result<()> {
        let first = self.shared.begin_teardown();
        let (drained, err) = self.shared.drain_async(DisposeReason::Teardown).await;
        self.shared.finish_teardown(first, drained, err)
    }
}
