//! Periodic cleanup of stale records
//!
//! Sessions that have been idle past the retention age are purged on a
//! timer. This is best-effort housekeeping with its own task lifecycle,
//! fully decoupled from request handling: a purged handle just means the
//! user logs in again, and no request-path invariant depends on the sweep
//! running at all.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::store::TokenStore;

/// Spawn a background task that purges records older than `max_age` every
/// `interval`.
///
/// Returns the `JoinHandle`; dropping or aborting it stops the sweep
/// without affecting the store.
pub fn spawn_sweep_task(
    store: Arc<dyn TokenStore>,
    interval: Duration,
    max_age: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip the immediate first tick — nothing is stale at startup
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = store.purge_older_than(max_age).await;
            if removed > 0 {
                info!(removed, "purged stale credential records");
            } else {
                debug!("sweep found no stale records");
            }
        }
    })
}
