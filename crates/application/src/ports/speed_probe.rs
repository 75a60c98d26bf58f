use async_trait::async_trait;
use std::time::Duration;

/// Port for the speed-probe dispatcher loop: block until work arrives (or
/// the idle timeout passes), then drain and dispatch whatever is queued.
#[async_trait]
pub trait SpeedProbePort: Send + Sync {
    async fn wait_for_jobs(&self, timeout: Duration);

    /// Returns the number of jobs dispatched.
    fn dispatch_pending(&self) -> usize;
}
