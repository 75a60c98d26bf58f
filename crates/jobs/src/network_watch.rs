use httpdns_application::NetworkWatchPort;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Fixed-interval polling keeps worst-case reaction latency bounded by the
/// interval; downstream timing contracts assume roughly this cadence.
const WATCH_INTERVAL: Duration = Duration::from_millis(500);

/// Polls the local address set through `NetworkWatchPort`. Change handling
/// (callback fan-out, dedup) lives behind the port; this is only the clock.
pub struct NetworkWatchJob {
    watcher: Arc<dyn NetworkWatchPort>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl NetworkWatchJob {
    pub fn new(watcher: Arc<dyn NetworkWatchPort>) -> Self {
        Self {
            watcher,
            interval: WATCH_INTERVAL,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub async fn start(self: Arc<Self>) {
        info!(interval_ms = self.interval.as_millis() as u64, "network watch job running");
        let mut tick = tokio::time::interval(self.interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("network watch job: shutting down");
                    break;
                }
                _ = tick.tick() => {
                    let outcome = self.watcher.observe_once().await;
                    if outcome.changed {
                        debug!(addresses = outcome.addresses, "network change observed");
                    }
                }
            }
        }
    }
}
