use httpdns_application::SpeedProbePort;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Idle wake-up bound when no enqueue signal arrives.
const IDLE_WAIT: Duration = Duration::from_secs(5);

/// Dispatcher for the speed-probe queue: wake on signal or timeout, drain
/// whatever producers queued meanwhile.
pub struct SpeedProbeJob {
    prober: Arc<dyn SpeedProbePort>,
    shutdown: CancellationToken,
}

impl SpeedProbeJob {
    pub fn new(prober: Arc<dyn SpeedProbePort>) -> Self {
        Self {
            prober,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub async fn start(self: Arc<Self>) {
        info!("speed probe dispatcher running");
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("speed probe dispatcher: shutting down");
                    break;
                }
                _ = self.prober.wait_for_jobs(IDLE_WAIT) => {}
            }
            let dispatched = self.prober.dispatch_pending();
            if dispatched > 0 {
                debug!(dispatched, "speed probe jobs dispatched");
            }
        }
    }
}
