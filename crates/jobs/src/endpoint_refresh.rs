use httpdns_application::EndpointRefreshPort;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Wakes when the next refresh is due or when one is requested on demand
/// (an exhausted endpoint list). Success pushes the next due time hours
/// out; failure schedules a much sooner retry — the port owns that
/// bookkeeping, this loop only sleeps on it.
pub struct EndpointRefreshJob {
    refresher: Arc<dyn EndpointRefreshPort>,
    shutdown: CancellationToken,
}

impl EndpointRefreshJob {
    pub fn new(refresher: Arc<dyn EndpointRefreshPort>) -> Self {
        Self {
            refresher,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub async fn start(self: Arc<Self>) {
        info!("endpoint refresh job running");
        loop {
            let due_in = self.refresher.refresh_due_in();
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("endpoint refresh job: shutting down");
                    break;
                }
                _ = tokio::time::sleep(due_in) => {}
                _ = self.refresher.refresh_requested() => {}
            }
            if self.shutdown.is_cancelled() {
                break;
            }
            match self.refresher.run_refresh_cycle().await {
                Ok(outcome) => {
                    if outcome.v4_applied > 0 || outcome.v6_applied > 0 {
                        info!(
                            v4 = outcome.v4_applied,
                            v6 = outcome.v6_applied,
                            "endpoint refresh cycle applied"
                        );
                    }
                }
                Err(e) => {
                    warn!(error = %e, "endpoint refresh cycle failed");
                }
            }
        }
    }
}
