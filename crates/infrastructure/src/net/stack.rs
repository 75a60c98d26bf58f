use httpdns_application::LocalDnsPort;
use httpdns_domain::IpStackType;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tracing::{debug, info};

const V4_PROBE_TARGET: &str = "8.8.8.8:53";
const V6_PROBE_TARGET: &str = "[2001:4860:4860::8888]:53";
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);
/// How long redetection keeps retrying after a network transition.
const REDETECT_WINDOW: Duration = Duration::from_secs(30);
const REDETECT_PAUSE: Duration = Duration::from_secs(1);

const STATE_UNSET: u8 = 0;
const STATE_UNKNOWN: u8 = 1;
const STATE_V4: u8 = 2;
const STATE_V6: u8 = 3;
const STATE_DUAL: u8 = 4;

/// Detects which address families the current network path supports and
/// caches the answer until a network change invalidates it.
pub struct StackDetector {
    cached: AtomicU8,
}

impl StackDetector {
    pub fn new() -> Self {
        Self {
            cached: AtomicU8::new(STATE_UNSET),
        }
    }

    pub fn cached(&self) -> IpStackType {
        decode(self.cached.load(Ordering::Acquire))
    }

    pub fn invalidate(&self) {
        self.cached.store(STATE_UNSET, Ordering::Release);
    }

    /// Probe both families; fall back to resolving a dual-stack probe
    /// domain when neither probe is conclusive. The result is cached.
    pub async fn detect(&self, probe_domain: &str, local_dns: &dyn LocalDnsPort) -> IpStackType {
        let v4 = probe_route("0.0.0.0:0", V4_PROBE_TARGET).await;
        let v6 = probe_route("[::]:0", V6_PROBE_TARGET).await;

        let stack = match (v4, v6) {
            (true, true) => IpStackType::Dual,
            (true, false) => IpStackType::V4,
            (false, true) => IpStackType::V6,
            (false, false) => probe_via_local_dns(probe_domain, local_dns).await,
        };

        self.cached.store(encode(stack), Ordering::Release);
        debug!(stack = %stack, "network stack detected");
        stack
    }

    /// Invalidate, then retry detection until it is conclusive or the
    /// redetection window closes.
    pub async fn redetect(&self, probe_domain: &str, local_dns: &dyn LocalDnsPort) -> IpStackType {
        self.invalidate();
        let started = Instant::now();
        loop {
            let stack = self.detect(probe_domain, local_dns).await;
            if stack.is_known() {
                info!(stack = %stack, "network stack redetected");
                return stack;
            }
            if started.elapsed() >= REDETECT_WINDOW {
                info!("network stack still unknown after redetection window");
                return stack;
            }
            tokio::time::sleep(REDETECT_PAUSE).await;
        }
    }
}

impl Default for StackDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Connect a UDP socket toward a well-known address. No datagram is sent;
/// success only means the kernel has a route for that family.
async fn probe_route(bind: &str, target: &str) -> bool {
    match UdpSocket::bind(bind).await {
        Ok(socket) => socket.connect(target).await.is_ok(),
        Err(_) => false,
    }
}

async fn probe_via_local_dns(probe_domain: &str, local_dns: &dyn LocalDnsPort) -> IpStackType {
    let addrs = match local_dns.lookup(probe_domain, LOOKUP_TIMEOUT).await {
        Ok(addrs) => addrs,
        Err(e) => {
            debug!(domain = probe_domain, error = %e, "probe-domain lookup failed");
            return IpStackType::Unknown;
        }
    };
    let v4 = addrs.iter().any(|a| a.is_ipv4());
    let v6 = addrs.iter().any(|a| a.is_ipv6());
    match (v4, v6) {
        (true, true) => IpStackType::Dual,
        (true, false) => IpStackType::V4,
        (false, true) => IpStackType::V6,
        (false, false) => IpStackType::Unknown,
    }
}

fn encode(stack: IpStackType) -> u8 {
    match stack {
        IpStackType::Unknown => STATE_UNKNOWN,
        IpStackType::V4 => STATE_V4,
        IpStackType::V6 => STATE_V6,
        IpStackType::Dual => STATE_DUAL,
    }
}

fn decode(state: u8) -> IpStackType {
    match state {
        STATE_V4 => IpStackType::V4,
        STATE_V6 => IpStackType::V6,
        STATE_DUAL => IpStackType::Dual,
        // STATE_UNSET and STATE_UNKNOWN both read as Unknown.
        _ => IpStackType::Unknown,
    }
}
