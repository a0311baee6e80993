//! Event broadcasting for pool lifecycle observability.
//!
//! Provides [`PoolEvent`] variants emitted as resources move between
//! construction, loan, idle and retirement, and an [`EventBus`] backed by
//! `tokio::sync::broadcast`.

use tokio::sync::broadcast;

use crate::poolable::PoolId;

// ---------------------------------------------------------------------------
// PoolEvent
// ---------------------------------------------------------------------------

/// Events emitted by a pool.
///
/// All variants carry the `pool_id` of the emitting pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEvent {
    /// A new resource was constructed by the activator.
    Created {
        /// The emitting pool.
        pool_id: PoolId,
    },
    /// A resource was handed out on a lease.
    Rented {
        /// The emitting pool.
        pool_id: PoolId,
        /// `true` if the resource came from the idle queue.
        reused: bool,
    },
    /// A resource was reset and placed in the idle queue.
    Returned {
        /// The emitting pool.
        pool_id: PoolId,
    },
    /// A resource was permanently retired.
    Disposed {
        /// The emitting pool.
        pool_id: PoolId,
        /// Why the resource was retired.
        reason: DisposeReason,
    },
    /// A leased resource was detached and will never come back.
    Detached {
        /// The emitting pool.
        pool_id: PoolId,
    },
    /// The pool was torn down.
    TornDown {
        /// The emitting pool.
        pool_id: PoolId,
        /// Number of idle resources drained.
        drained: usize,
    },
}

impl PoolEvent {
    /// The pool that emitted this event.
    #[must_use]
    pub fn pool_id(&self) -> PoolId {
        match self {
            Self::Created { pool_id }
            | Self::Rented { pool_id, .. }
            | Self::Returned { pool_id }
            | Self::Disposed { pool_id, .. }
            | Self::Detached { pool_id }
            | Self::TornDown { pool_id, .. } => *pool_id,
        }
    }
}

// ---------------------------------------------------------------------------
// DisposeReason
// ---------------------------------------------------------------------------

/// Reason a resource was permanently retired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisposeReason {
    /// Returned while the idle queue was at capacity.
    Overflow,
    /// Reset failed; the resource is not fit for reuse.
    ResetFailed,
    /// An async return was cancelled mid-reset.
    Cancelled,
    /// Drained by pool teardown.
    Teardown,
    /// Drained when the last pool handle went away.
    PoolDropped,
}

impl std::fmt::Display for DisposeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overflow => write!(f, "overflow"),
            Self::ResetFailed => write!(f, "reset_failed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Teardown => write!(f, "teardown"),
            Self::PoolDropped => write!(f, "pool_dropped"),
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Broadcast-based event bus for pool events.
///
/// Emission is fire-and-forget: if no subscribers are listening or the
/// channel is full, events are dropped. The pool never waits on a subscriber.
pub struct EventBus {
    sender: broadcast::Sender<PoolEvent>,
}

impl EventBus {
    /// Create a new event bus with the given buffer size.
    #[must_use]
    pub fn new(buffer_size: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer_size);
        Self { sender }
    }

    /// Emit an event to all current subscribers.
    pub fn emit(&self, event: PoolEvent) {
        // Err only means there are no receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to events emitted after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.sender.receiver_count())
            .finish()
    }
}
