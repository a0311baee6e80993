//! # Nebula Pool
//!
//! Lock-free pooling of expensive, stateful session objects (database
//! contexts, protocol sessions) that can be reset to steady state and reused
//! instead of reconstructed.
//!
//! A [`Pool`] hands out [`Lease`]s. Each lease owns one instance exclusively
//! and returns it exactly once: the instance is reset and re-enqueued while
//! the idle queue has room, and disposed otherwise.
//!
//! ```rust,ignore
//! let pool = Pool::<DbContext>::new(options, PoolConfig::default())?;
//!
//! let mut ctx = pool.rent()?;
//! ctx.insert(order);
//! ctx.release()?; // or just let `ctx` go out of scope
//! ```

pub mod activator;
pub mod config;
pub mod error;
pub mod events;
pub mod lease;
pub mod pool;
pub mod poolable;

pub use activator::Activator;
pub use config::{DEFAULT_MAX_SIZE, PoolConfig};
pub use error::{BoxError, Error, Result};
pub use events::{DisposeReason, EventBus, PoolEvent};
pub use lease::Lease;
pub use pool::{Pool, PoolStats};
pub use poolable::{Config, PoolBinding, PoolId, Poolable};
