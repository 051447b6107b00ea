//! Background eviction of idle buckets.
//!
//! # Responsibilities
//! - Periodically drop buckets whose callers went quiet
//! - Publish the number of tracked buckets
//!
//! # Design Decisions
//! - Idle window is read from the live settings on every pass
//! - Exits on the shared shutdown signal

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::time;

use crate::admission::store::BucketStore;
use crate::config::RuntimeSettings;
use crate::observability::metrics;

pub struct EvictionSweeper {
    store: Arc<dyn BucketStore>,
    settings: RuntimeSettings,
    interval: Duration,
}

impl EvictionSweeper {
    pub fn new(store: Arc<dyn BucketStore>, settings: RuntimeSettings, interval: Duration) -> Self {
        Self {
            store,
            settings,
            interval,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval = ?self.interval, "Bucket eviction sweeper starting");

        let mut ticker = time::interval(self.interval);
        // the first tick fires immediately and there is nothing to evict yet
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep(Instant::now());
                }
                _ = shutdown.recv() => {
                    tracing::info!("Eviction sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// One eviction pass. Returns the number of buckets removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let idle = self.settings.load().admission.idle_eviction();
        let removed = self.store.evict_idle(now, idle);
        let remaining = self.store.tracked_keys();

        if removed > 0 {
            tracing::debug!(removed, remaining, "Evicted idle rate limit buckets");
        }
        metrics::record_bucket_count(remaining);
        removed
    }
}
