use async_trait::async_trait;
use httpdns_application::SpeedProbePort;
use std::collections::VecDeque;
use std::net::{IpAddr, SocketAddr};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tracing::debug;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
/// Elapsed-time stand-in for a candidate that failed to connect or could
/// not be parsed; sorts after every real measurement.
const FAILURE_PENALTY_MS: u64 = 600_000;

/// One "rank these candidates against a target port" job. The callback
/// receives the candidates sorted by ascending connect time.
pub struct ProbeJob {
    pub label: String,
    pub ips: Vec<String>,
    pub port: u16,
    pub on_ranked: Box<dyn FnOnce(Vec<String>) + Send>,
}

/// Producer/consumer queue for speed probing. Producers enqueue jobs; the
/// dispatcher loop (jobs crate) wakes on the signal or a timeout, drains the
/// queue and runs each job as its own task.
pub struct SpeedProbeQueue {
    pending: Mutex<VecDeque<ProbeJob>>,
    signal: Notify,
    connect_timeout: Duration,
}

impl SpeedProbeQueue {
    pub fn new() -> Self {
        Self::with_connect_timeout(CONNECT_TIMEOUT)
    }

    pub fn with_connect_timeout(connect_timeout: Duration) -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            signal: Notify::new(),
            connect_timeout,
        }
    }

    pub fn enqueue(&self, job: ProbeJob) {
        {
            let mut pending = self.pending.lock().expect("probe queue mutex poisoned");
            pending.push_back(job);
        }
        self.signal.notify_one();
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().expect("probe queue mutex poisoned").len()
    }
}

impl Default for SpeedProbeQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeedProbePort for SpeedProbeQueue {
    async fn wait_for_jobs(&self, timeout: Duration) {
        tokio::select! {
            _ = self.signal.notified() => {}
            _ = tokio::time::sleep(timeout) => {}
        }
    }

    fn dispatch_pending(&self) -> usize {
        let jobs: Vec<ProbeJob> = {
            let mut pending = self.pending.lock().expect("probe queue mutex poisoned");
            pending.drain(..).collect()
        };
        let dispatched = jobs.len();
        for job in jobs {
            let connect_timeout = self.connect_timeout;
            tokio::spawn(async move {
                run_probe(job, connect_timeout).await;
            });
        }
        dispatched
    }
}

async fn run_probe(job: ProbeJob, connect_timeout: Duration) {
    let mut ranked: Vec<(u64, String)> = Vec::with_capacity(job.ips.len());
    for ip in &job.ips {
        let elapsed = probe_one(ip, job.port, connect_timeout).await;
        ranked.push((elapsed, ip.clone()));
    }
    ranked.sort_by(|a, b| a.0.cmp(&b.0));
    debug!(
        label = %job.label,
        fastest_ms = ranked.first().map(|r| r.0).unwrap_or(0),
        candidates = ranked.len(),
        "speed probe finished"
    );
    (job.on_ranked)(ranked.into_iter().map(|(_, ip)| ip).collect());
}

/// Connect time in milliseconds, or the failure penalty.
async fn probe_one(ip: &str, port: u16, connect_timeout: Duration) -> u64 {
    let addr: IpAddr = match ip.parse() {
        Ok(addr) => addr,
        Err(_) => return FAILURE_PENALTY_MS,
    };
    let target = SocketAddr::new(addr, port);
    let started = Instant::now();
    match tokio::time::timeout(connect_timeout, TcpStream::connect(target)).await {
        Ok(Ok(_)) => started.elapsed().as_millis() as u64,
        _ => FAILURE_PENALTY_MS,
    }
}
