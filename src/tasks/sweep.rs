//! Expiry Sweep Task
//!
//! Background task that periodically reclaims expired cache entries.
//! Lookups already drop expired entries lazily; the sweep covers keys that
//! are never requested again.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::KnowledgeCache;

/// Spawns a background task that periodically removes expired entries.
///
/// The task sleeps for `interval_secs` between runs and holds the store
/// lock only for the duration of each purge.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = KnowledgeCache::new(&CacheConfig::default());
/// let sweep_handle = spawn_sweep_task(cache.clone(), 60);
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task(cache: KnowledgeCache, interval_secs: u64) -> JoinHandle<()> {
    spawn_sweep_every(cache, Duration::from_secs(interval_secs.max(1)))
}

fn spawn_sweep_every(cache: KnowledgeCache, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting expiry sweep task with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.sweep_expired();
            if removed > 0 {
                info!("Expiry sweep: removed {} expired entries", removed);
            } else {
                debug!("Expiry sweep: no expired entries found");
            }
        }
    })
}
