use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::info;

use vidrelay_store::InlineCache;

/// Periodically evicts stale inline-query results.
///
/// Independent of the scheduler; runs on its own timer.
pub struct Sweeper {
    cache: Arc<InlineCache>,
    interval: Duration,
}

impl Sweeper {
    pub fn new(cache: Arc<InlineCache>, interval: Duration) -> Self {
        Self { cache, interval }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "inline sweeper started");
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let stats = self.cache.sweep();
                    if stats.evicted > 0 {
                        info!(evicted = stats.evicted, remaining = self.cache.len(), "inline cache evicted");
                    }
                }
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        info!("inline sweeper shutting down");
                        break;
                    }
                }
            }
        }
    }
}
