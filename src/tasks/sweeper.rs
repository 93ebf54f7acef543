//! Eviction Sweep Task
//!
//! Background task that periodically removes idle- and age-expired entries
//! from one cache instance.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::cache::{CacheKey, CacheValue, ObjectCache};

// == Sweeper Handle ==
/// Handle to a running sweep task.
///
/// [`SweeperHandle::stop`] signals shutdown and then joins the task, so no
/// expire notification can fire after `stop` returns. Dropping the handle
/// without stopping also ends the task (the shutdown channel closes), just
/// without the join guarantee.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signals the task to stop and waits for it to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }

    /// Whether the task has already exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

// == Spawn ==
/// Spawns the periodic sweep task for a cache.
///
/// The task holds only a weak reference: it exits on its own once the cache
/// is dropped, and it never blocks `get`/`put` callers beyond the atomic
/// removal of already-decided victims inside `sweep_now`.
pub fn spawn_sweep_task<K: CacheKey, V: CacheValue>(
    cache: Weak<ObjectCache<K, V>>,
    interval: Duration,
) -> SweeperHandle {
    let (shutdown, mut shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a tokio interval fires immediately; a sweep at
        // startup would be a no-op, so consume it.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let Some(cache) = cache.upgrade() else {
                        debug!("Cache dropped; sweep task exiting");
                        break;
                    };
                    let removed = cache.sweep_now().await;
                    if removed > 0 {
                        info!(cache = %cache.name(), removed, "Sweep removed expired entries");
                    } else {
                        debug!(cache = %cache.name(), "Sweep found no expired entries");
                    }
                }
                _ = shutdown_rx.changed() => {
                    debug!("Sweep task shutting down");
                    break;
                }
            }
        }
    });

    SweeperHandle { shutdown, handle }
}
