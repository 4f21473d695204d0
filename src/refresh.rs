//! Background refresh loop for the service cache.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::state::ServiceCache;

/// Refreshes a [`ServiceCache`] on a fixed period until cancelled.
pub struct RefreshTask {
    cache: ServiceCache,
    interval: Duration,
}

impl RefreshTask {
    /// Create a task refreshing `cache` every `interval`.
    pub fn new(cache: ServiceCache, interval: Duration) -> Self {
        Self { cache, interval }
    }

    /// Spawn the loop onto the tokio runtime.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Run until `shutdown` fires.
    ///
    /// The first tick is one full period away; the eager refresh belongs to
    /// whoever created the cache. A refresh that is already running when
    /// `shutdown` fires completes before the loop exits. Ticks missed while a
    /// slow pull was running are skipped, not replayed.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(interval_secs = self.interval.as_secs(), "Starting service refresh loop");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Service refresh loop shutting down");
                    return;
                }

                _ = ticker.tick() => {
                    debug!("Refreshing services data from ranger");
                    self.cache.refresh().await;
                }
            }
        }
    }
}
