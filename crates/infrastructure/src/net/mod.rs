mod speed;
mod stack;
mod watch;

pub use speed::{ProbeJob, SpeedProbeQueue};
pub use stack::StackDetector;
pub use watch::{ChangeCallback, ChangeWatcher, WatchKind};

use httpdns_application::LocalDnsPort;
use httpdns_domain::IpStackType;
use std::sync::Arc;

/// Process-wide network detector: cached stack type, change watcher and
/// speed-probe queue. Shared by every client through the runtime context.
pub struct NetworkDetector {
    stack: StackDetector,
    watcher: Arc<ChangeWatcher>,
    prober: Arc<SpeedProbeQueue>,
    local_dns: Arc<dyn LocalDnsPort>,
}

impl NetworkDetector {
    pub fn new(local_dns: Arc<dyn LocalDnsPort>) -> Self {
        Self {
            stack: StackDetector::new(),
            watcher: Arc::new(ChangeWatcher::new()),
            prober: Arc::new(SpeedProbeQueue::new()),
            local_dns,
        }
    }

    /// Last detected stack type; `Unknown` before the first detection or
    /// right after an invalidation.
    pub fn cached_stack(&self) -> IpStackType {
        self.stack.cached()
    }

    pub async fn detect_stack(&self, probe_domain: &str) -> IpStackType {
        self.stack.detect(probe_domain, self.local_dns.as_ref()).await
    }

    /// Invalidate and redetect after a network change. The stack may not be
    /// usable immediately after a transition, so detection is retried for a
    /// bounded window.
    pub async fn redetect_stack(&self, probe_domain: &str) -> IpStackType {
        self.stack
            .redetect(probe_domain, self.local_dns.as_ref())
            .await
    }

    pub fn watcher(&self) -> &Arc<ChangeWatcher> {
        &self.watcher
    }

    pub fn prober(&self) -> &Arc<SpeedProbeQueue> {
        &self.prober
    }
}
