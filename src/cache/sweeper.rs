use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use crate::cache::price_cache::PriceCache;

/// Periodically drops entries whose key has had no successful refresh
/// for `dead_after`.
pub struct CacheSweeper {
    caches: Vec<Arc<PriceCache>>,
    dead_after: Duration,
    interval: Duration,
}

impl CacheSweeper {
    pub fn new(caches: Vec<Arc<PriceCache>>, dead_after: Duration, interval: Duration) -> Self {
        CacheSweeper { caches, dead_after, interval }
    }

    pub fn sweep_once(&self) -> usize {
        self.caches.iter().map(|cache| cache.sweep(self.dead_after)).sum()
    }

    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately and there is nothing to sweep yet.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.sweep_once();
                    if removed > 0 {
                        tracing::info!(removed, "Cache sweep removed dead entries");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        tracing::debug!("Cache sweeper stopped");
    }
}
