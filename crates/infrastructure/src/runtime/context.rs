use crate::local_dns::SystemLocalDns;
use crate::net::NetworkDetector;
use crate::transport::HttpQueryTransport;
use httpdns_domain::HttpDnsError;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

/// Process-wide singletons shared by every client: the pooled HTTP
/// transport, the network detector and the task tracker. Explicitly
/// reference-counted: the Nth-to-last release is a no-op, only the last one
/// tears shared state down.
pub struct SharedContext {
    pub transport: Arc<HttpQueryTransport>,
    pub detector: Arc<NetworkDetector>,
    pub tracker: TaskTracker,
    pub root_token: CancellationToken,
    /// Set by the first client to spawn the detector's process-wide loops
    /// (change watcher, speed-probe dispatcher); later clients reuse them.
    pub detector_loops_started: AtomicBool,
}

struct Slot {
    context: Arc<SharedContext>,
    refs: usize,
}

static CONTEXT: Mutex<Option<Slot>> = Mutex::new(None);

/// Take a reference to the shared context, initializing it on first use.
pub fn acquire_context() -> Result<Arc<SharedContext>, HttpDnsError> {
    let mut slot = CONTEXT.lock().expect("context mutex poisoned");
    if let Some(existing) = slot.as_mut() {
        existing.refs += 1;
        return Ok(Arc::clone(&existing.context));
    }

    let transport = Arc::new(HttpQueryTransport::new()?);
    let detector = Arc::new(NetworkDetector::new(Arc::new(SystemLocalDns)));
    let context = Arc::new(SharedContext {
        transport,
        detector,
        tracker: TaskTracker::new(),
        root_token: CancellationToken::new(),
        detector_loops_started: AtomicBool::new(false),
    });
    *slot = Some(Slot {
        context: Arc::clone(&context),
        refs: 1,
    });
    info!("shared httpdns context initialized");
    Ok(context)
}

/// Drop one reference; the last one cancels the root token and closes the
/// tracker so background loops drain.
pub fn release_context() {
    let mut slot = CONTEXT.lock().expect("context mutex poisoned");
    let Some(existing) = slot.as_mut() else {
        return;
    };
    existing.refs = existing.refs.saturating_sub(1);
    if existing.refs > 0 {
        return;
    }
    if let Some(last) = slot.take() {
        last.context.root_token.cancel();
        last.context.tracker.close();
        info!("shared httpdns context released");
    }
}
