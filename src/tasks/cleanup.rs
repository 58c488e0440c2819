//! Maintenance Tasks
//!
//! Background loops that keep long-running shared instances from accumulating
//! dead state.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::SharedCache;
use crate::limiter::SharedRateLimiter;

/// Spawns a background task that periodically purges expired cache entries.
///
/// The task runs until aborted, sleeping for `interval` between runs.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during shutdown.
///
/// # Example
/// ```ignore
/// let handle = spawn_cache_cleanup(cache.clone(), Duration::from_secs(1));
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_cache_cleanup<V>(cache: SharedCache<V>, interval: Duration) -> JoinHandle<()>
where
    V: Send + 'static,
{
    tokio::spawn(async move {
        info!(?interval, "Starting cache cleanup task");

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.purge_expired().await;
            if removed > 0 {
                info!("Cache cleanup: removed {} expired entries", removed);
            } else {
                debug!("Cache cleanup: no expired entries found");
            }
        }
    })
}

/// Spawns a background task that periodically drops idle limiter key state.
///
/// Only state equivalent to a fresh key is dropped, so no decision changes.
pub fn spawn_limiter_sweep(limiter: SharedRateLimiter, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(?interval, "Starting limiter sweep task");

        loop {
            tokio::time::sleep(interval).await;

            let dropped = limiter.prune_idle().await;
            if dropped > 0 {
                info!("Limiter sweep: dropped {} idle keys", dropped);
            } else {
                debug!("Limiter sweep: no idle keys found");
            }
        }
    })
}
