//! Scoped lease over one pooled instance.

use std::sync::Arc;

use crate::error::Result;
use crate::pool::{Entry, Shared};
use crate::poolable::{PoolId, Poolable};

/// Exclusive, time-bounded ownership of one pooled instance.
///
/// The instance goes back to its pool exactly once: through
/// [`Lease::release`], [`Lease::release_async`], or on drop. Both release
/// methods consume the lease, so the instance cannot be touched afterwards.
/// Use [`Lease::into_inner`] to keep the instance and detach it from the pool.
#[must_use = "dropping a lease returns the instance immediately"]
pub struct Lease<T: Poolable> {
    entry: Option<Entry<T>>,
    reused: bool,
    shared: Arc<Shared<T>>,
}

impl<T: Poolable> Lease<T> {
    pub(crate) fn new(entry: Entry<T>, reused: bool, shared: Arc<Shared<T>>) -> Self {
        Self {
            entry: Some(entry),
            reused,
            shared,
        }
    }

    /// Identity of the pool this lease returns to.
    #[must_use]
    pub fn pool_id(&self) -> PoolId {
        self.shared.id()
    }

    /// `true` if the instance was taken from the idle queue rather than
    /// freshly constructed.
    #[must_use]
    pub fn is_reused(&self) -> bool {
        self.reused
    }

    /// Reset the instance and return it to the pool.
    ///
    /// # Errors
    /// [`Error::Reset`](crate::Error::Reset) if the instance could not be
    /// reset (it is disposed instead), or
    /// [`Error::Dispose`](crate::Error::Dispose) if it was retired and its
    /// disposal failed.
    pub fn release(mut self) -> Result<()> {
        match self.entry.take() {
            Some(entry) => self.shared.return_entry(entry),
            None => Ok(()),
        }
    }

    /// Suspend-capable [`Lease::release`].
    ///
    /// Cancelling the returned future before it completes disposes the
    /// instance instead of returning it.
    pub async fn release_async(mut self) -> Result<()> {
        match self.entry.take() {
            Some(entry) => self.shared.return_entry_async(entry).await,
            None => Ok(()),
        }
    }

    /// Take the instance out of the pool for good.
    ///
    /// The back-reference is cleared and the instance will never be
    /// returned or disposed by the pool.
    #[must_use]
    pub fn into_inner(mut self) -> T {
        let mut entry = self.entry.take().expect("lease used after release");
        self.shared.detach(&mut entry);
        entry.resource
    }
}

impl<T: Poolable> std::ops::Deref for Lease<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.entry.as_ref().expect("lease used after release").resource
    }
}

impl<T: Poolable> std::ops::DerefMut for Lease<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.entry.as_mut().expect("lease used after release").resource
    }
}

impl<T: Poolable> Drop for Lease<T> {
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take()
            && let Err(err) = self.shared.return_entry(entry)
        {
            tracing::warn!(
                pool_id = %self.shared.id(),
                error = %err,
                "Returning dropped lease failed"
            );
        }
    }
}

impl<T: Poolable + std::fmt::Debug> std::fmt::Debug for Lease<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("pool_id", &self.shared.id())
            .field("reused", &self.reused)
            .field("resource", &self.entry.as_ref().map(|entry| &entry.resource))
            .finish()
    }
}
