// Pooled database context example.
//
// Demonstrates renting per-request sessions, change-tracker reset on return,
// overflow disposal, scoped leases, event bus subscription and teardown.

use std::any::type_name;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use nebula_pool::{Config, Error, EventBus, Pool, PoolBinding, PoolConfig, Poolable};

// -- Configuration ----------------------------------------------------------

#[derive(Debug, Clone)]
struct DbOptions {
    connection_string: String,
    command_timeout_secs: u32,
}

impl Config for DbOptions {
    fn validate(&self) -> nebula_pool::Result<()> {
        if self.connection_string.is_empty() {
            return Err(Error::configuration(
                type_name::<Self>(),
                "connection_string must not be empty",
            ));
        }
        Ok(())
    }
}

// -- Session ----------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
#[error("rollback of pending changes failed")]
struct RollbackFailed;

/// Simulated unit-of-work session.
#[derive(Debug)]
struct DbContext {
    id: u64,
    command_timeout_secs: u32,
    tracked: Vec<String>,
    pool: Option<PoolBinding>,
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

impl Poolable for DbContext {
    type Config = DbOptions;
    type Snapshot = u32;
    type Error = RollbackFailed;

    fn activate(options: &DbOptions) -> Result<Self, RollbackFailed> {
        let id = NEXT_ID.fetch_add(1, Ordering::SeqCst);
        println!("  [activate] new context #{id} for {}", options.connection_string);
        Ok(Self {
            id,
            command_timeout_secs: options.command_timeout_secs,
            tracked: Vec::new(),
            pool: None,
        })
    }

    fn snapshot_configuration(&self) -> u32 {
        self.command_timeout_secs
    }

    fn resurrect(&mut self, timeout: &u32) {
        self.command_timeout_secs = *timeout;
    }

    fn reset(&mut self) -> Result<(), RollbackFailed> {
        // Forget tracked entities so the next caller starts clean.
        self.tracked.clear();
        Ok(())
    }

    fn set_pool(&mut self, binding: Option<PoolBinding>) {
        self.pool = binding;
    }

    fn dispose(self) -> Result<(), RollbackFailed> {
        println!("  [dispose] closing context #{}", self.id);
        Ok(())
    }
}

// -- Main -------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Pooled DbContext Example ===\n");

    // 1. Subscribe to pool events before any traffic.
    let event_bus = Arc::new(EventBus::new(256));
    let mut event_rx = event_bus.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            println!("  [event] {event:?}");
        }
    });

    // 2. Create a pool holding at most two idle contexts.
    let options = DbOptions {
        connection_string: "host=localhost dbname=orders".into(),
        command_timeout_secs: 30,
    };
    let pool = Pool::<DbContext>::new(options, PoolConfig::with_max_size(2))?
        .with_event_bus(event_bus);
    println!("Pool {} created\n", pool.id());

    // 3. Three concurrent requests; only two contexts fit back in the pool.
    let mut a = pool.rent()?;
    let mut b = pool.rent()?;
    let c = pool.rent()?;
    a.tracked.push("Order#1".into());
    b.command_timeout_secs = 5;
    println!("  contexts #{}, #{}, #{} on loan", a.id, b.id, c.id);

    a.release()?;
    b.release_async().await?;
    c.release()?; // overflow: disposed
    println!("\nAfter returns: {:?}\n", pool.stats());

    // 4. Reused contexts are clean and carry the original timeout.
    let reused = pool
        .with_lease(|ctx| (ctx.id, ctx.tracked.len(), ctx.command_timeout_secs))?;
    println!("  reused context {reused:?}");

    let saved = pool
        .with_lease_async(async |ctx: &mut DbContext| {
            ctx.tracked.push("Customer#7".into());
            tokio::task::yield_now().await;
            ctx.tracked.len()
        })
        .await?;
    println!("  saved {saved} entity in a scoped lease\n");

    // 5. Teardown disposes the idle contexts.
    pool.dispose_async().await?;
    println!("\nPool torn down: {:?}", pool.stats());
    assert!(matches!(pool.rent(), Err(Error::Disposed { .. })));

    Ok(())
}
