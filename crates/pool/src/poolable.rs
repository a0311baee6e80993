//! The contract a type must satisfy to be pooled.
//!
//! A [`Poolable`] is an expensive, stateful session object (a database
//! context, a protocol session) that can be brought back to steady state
//! cheaply. The pool never reconstructs a returned object: it calls
//! [`Poolable::reset`] on the way in and [`Poolable::resurrect`] on the way
//! out.

use std::fmt;
use std::future::Future;

use uuid::Uuid;

use crate::error::Result;

/// Configuration value handed to a resource's designated constructor.
pub trait Config: Clone + Send + Sync + 'static {
    /// Validate the configuration, returning an error if invalid.
    ///
    /// Called once, when the pool's activator is built.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Unique identity of one pool instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolId(Uuid);

impl PoolId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Back-reference from a resource to the pool that owns it.
///
/// A resource holds a binding exactly while it is eligible to be returned to
/// that pool. The pool hands one out when the resource is first constructed
/// and takes it away (`set_pool(None)`) when the resource is retired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolBinding {
    pool_id: PoolId,
}

impl PoolBinding {
    pub(crate) fn new(pool_id: PoolId) -> Self {
        Self { pool_id }
    }

    /// Identity of the owning pool.
    #[must_use]
    pub fn pool_id(&self) -> PoolId {
        self.pool_id
    }
}

/// A resettable session object that can live in a [`Pool`](crate::Pool).
///
/// `activate` is the single designated constructor; trait coherence
/// guarantees there is exactly one per type, so the pool never has to pick
/// between candidates at runtime.
///
/// The async variants default to their blocking counterparts. Override them
/// when reset or teardown needs I/O, e.g. a round-trip to roll back an open
/// transaction.
pub trait Poolable: Sized + Send + 'static {
    /// Configuration accepted by [`Poolable::activate`].
    type Config: Config;

    /// Immutable capture of steady-state configuration.
    type Snapshot: Send + Sync + 'static;

    /// Failure raised by construction, reset or disposal.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Construct a new, fully initialized instance.
    fn activate(config: &Self::Config) -> std::result::Result<Self, Self::Error>;

    /// Capture this instance's steady-state configuration.
    ///
    /// The pool calls this once per pool lifetime, on the first instance it
    /// constructs.
    fn snapshot_configuration(&self) -> Self::Snapshot;

    /// Restore steady state on a reused instance from the pool's snapshot.
    ///
    /// Must be cheap and idempotent.
    fn resurrect(&mut self, snapshot: &Self::Snapshot);

    /// Clear per-use state (open transactions, tracked changes, pending work).
    fn reset(&mut self) -> std::result::Result<(), Self::Error>;

    /// Suspend-capable [`Poolable::reset`].
    fn reset_async(&mut self) -> impl Future<Output = std::result::Result<(), Self::Error>> + Send {
        async move { self.reset() }
    }

    /// Bind to (`Some`) or unbind from (`None`) the owning pool.
    fn set_pool(&mut self, binding: Option<PoolBinding>);

    /// Permanently release the instance.
    fn dispose(self) -> std::result::Result<(), Self::Error> {
        drop(self);
        Ok(())
    }

    /// Suspend-capable [`Poolable::dispose`].
    fn dispose_async(self) -> impl Future<Output = std::result::Result<(), Self::Error>> + Send {
        async move { self.dispose() }
    }
}
