mod bootstrap;

pub use bootstrap::BootstrapRefresher;

use crate::net::{NetworkDetector, ProbeJob};
use httpdns_domain::{HttpDnsError, RecordFamily};
use std::collections::BTreeSet;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Next refresh check after a successful endpoint refresh.
const REFRESH_OK_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);
/// Retry cadence while refresh keeps failing.
const REFRESH_FAIL_INTERVAL: Duration = Duration::from_secs(2 * 60);

struct FamilyRotation {
    /// Copy-on-write snapshot: `current()` clones the Arc under a short
    /// lock, so a reader can hold a superseded list but never a freed one.
    servers: Arc<[String]>,
    cursor: usize,
}

impl FamilyRotation {
    fn new(servers: Vec<String>) -> Self {
        Self {
            servers: servers.into(),
            cursor: 0,
        }
    }
}

struct RefreshSchedule {
    last_ok: bool,
    next_due: Instant,
}

/// Rotates over ordered resolver-endpoint lists, one per IP stack. List
/// replacement and cursor reset share one critical section, so a cursor is
/// never observed out of bounds for the list it indexes after a completed
/// swap.
pub struct ServerScheduler {
    v4: Mutex<FamilyRotation>,
    v6: Mutex<FamilyRotation>,
    schedule: Mutex<RefreshSchedule>,
    refresh_kick: Notify,
    detector: Arc<NetworkDetector>,
    /// Port endpoint speed probes connect to (matches the query scheme).
    probe_port: u16,
}

impl ServerScheduler {
    pub fn new(
        detector: Arc<NetworkDetector>,
        initial_v4: Vec<String>,
        initial_v6: Vec<String>,
        probe_port: u16,
    ) -> Self {
        Self {
            v4: Mutex::new(FamilyRotation::new(initial_v4)),
            v6: Mutex::new(FamilyRotation::new(initial_v6)),
            schedule: Mutex::new(RefreshSchedule {
                last_ok: false,
                // First refresh is due immediately.
                next_due: Instant::now(),
            }),
            refresh_kick: Notify::new(),
            detector,
            probe_port,
        }
    }

    fn rotation(&self, family: RecordFamily) -> &Mutex<FamilyRotation> {
        match family {
            RecordFamily::A => &self.v4,
            RecordFamily::Aaaa => &self.v6,
        }
    }

    /// Which endpoint list serves the active stack. Everything except a
    /// v6-only path uses the v4 list.
    fn active_family(&self) -> RecordFamily {
        if self.detector.cached_stack() == httpdns_domain::IpStackType::V6 {
            RecordFamily::Aaaa
        } else {
            RecordFamily::A
        }
    }

    /// Endpoint at the rotation cursor of the active stack's list. A stale
    /// cursor (list shrank underneath it) silently resets to 0.
    pub fn current(&self) -> Result<String, HttpDnsError> {
        let family = self.active_family();
        let mut rotation = self.rotation(family).lock().expect("scheduler mutex poisoned");
        if rotation.servers.is_empty() {
            return Err(HttpDnsError::schedule_fail(format!(
                "no resolver endpoint available for {family}"
            )));
        }
        if rotation.cursor >= rotation.servers.len() {
            rotation.cursor = 0;
        }
        Ok(rotation.servers[rotation.cursor].clone())
    }

    /// Advance the cursor for every stack the failed endpoint's address
    /// family implies; a hostname endpoint implies both. Walking off the
    /// end of a list requests an asynchronous refresh.
    pub fn failover(&self, endpoint: &str) {
        for family in implied_families(endpoint) {
            let exhausted = {
                let mut rotation =
                    self.rotation(*family).lock().expect("scheduler mutex poisoned");
                if rotation.servers.is_empty() {
                    continue;
                }
                rotation.cursor += 1;
                rotation.cursor >= rotation.servers.len()
            };
            if exhausted {
                debug!(endpoint, family = %family, "endpoint list exhausted, requesting refresh");
                self.refresh_kick.notify_one();
            }
        }
        warn!(endpoint, "resolver endpoint marked failed");
    }

    /// Replace family lists independently: a refresh response may carry
    /// only one family. New lists are shuffled for load distribution, the
    /// cursor re-zeroed in the same critical section, and a speed-probe
    /// reorder kicked off per updated family.
    pub fn apply_refresh(
        self: &Arc<Self>,
        v4: Option<Vec<String>>,
        v6: Option<Vec<String>>,
    ) -> (usize, usize) {
        let v4_applied = self.replace_family(RecordFamily::A, v4);
        let v6_applied = self.replace_family(RecordFamily::Aaaa, v6);
        if v4_applied > 0 {
            self.enqueue_reorder(RecordFamily::A);
        }
        if v6_applied > 0 {
            self.enqueue_reorder(RecordFamily::Aaaa);
        }
        (v4_applied, v6_applied)
    }

    fn replace_family(&self, family: RecordFamily, servers: Option<Vec<String>>) -> usize {
        let Some(mut servers) = servers else {
            info!(family = %family, "refresh response carried no list for family");
            return 0;
        };
        if servers.is_empty() {
            info!(family = %family, "refresh response carried an empty list, keeping current");
            return 0;
        }
        fastrand::shuffle(&mut servers);
        let applied = servers.len();
        let mut rotation = self.rotation(family).lock().expect("scheduler mutex poisoned");
        rotation.servers = servers.into();
        rotation.cursor = 0;
        applied
    }

    fn enqueue_reorder(self: &Arc<Self>, family: RecordFamily) {
        let snapshot: Vec<String> = {
            let rotation = self.rotation(family).lock().expect("scheduler mutex poisoned");
            rotation.servers.to_vec()
        };
        if snapshot.len() < 2 {
            return;
        }
        let scheduler = Arc::clone(self);
        self.detector.prober().enqueue(ProbeJob {
            label: format!("resolvers-{family}"),
            ips: snapshot,
            port: self.probe_port,
            on_ranked: Box::new(move |ranked| {
                scheduler.reorder(family, ranked);
            }),
        });
    }

    /// Install a speed-ranked ordering, unless a refresh replaced the list
    /// membership while the probe ran.
    fn reorder(&self, family: RecordFamily, ranked: Vec<String>) {
        let mut rotation = self.rotation(family).lock().expect("scheduler mutex poisoned");
        let current: BTreeSet<&String> = rotation.servers.iter().collect();
        let probed: BTreeSet<&String> = ranked.iter().collect();
        if current != probed {
            debug!(family = %family, "endpoint list changed during probe, ranking discarded");
            return;
        }
        rotation.servers = ranked.into();
        rotation.cursor = 0;
        info!(family = %family, "resolver endpoints reordered by connect speed");
    }

    pub fn mark_refresh_result(&self, ok: bool) {
        let mut schedule = self.schedule.lock().expect("scheduler mutex poisoned");
        schedule.last_ok = ok;
        schedule.next_due = Instant::now()
            + if ok {
                REFRESH_OK_INTERVAL
            } else {
                REFRESH_FAIL_INTERVAL
            };
    }

    pub fn last_refresh_ok(&self) -> bool {
        self.schedule.lock().expect("scheduler mutex poisoned").last_ok
    }

    pub fn refresh_due_in(&self) -> Duration {
        let schedule = self.schedule.lock().expect("scheduler mutex poisoned");
        schedule.next_due.saturating_duration_since(Instant::now())
    }

    /// Resolves when a failover exhausted an endpoint list.
    pub async fn refresh_requested(&self) {
        self.refresh_kick.notified().await;
    }

    pub fn endpoints(&self, family: RecordFamily) -> Vec<String> {
        self.rotation(family)
            .lock()
            .expect("scheduler mutex poisoned")
            .servers
            .to_vec()
    }
}

fn implied_families(endpoint: &str) -> &'static [RecordFamily] {
    let bare = endpoint.trim_start_matches('[').trim_end_matches(']');
    if bare.parse::<Ipv4Addr>().is_ok() {
        &[RecordFamily::A]
    } else if bare.parse::<Ipv6Addr>().is_ok() {
        &[RecordFamily::Aaaa]
    } else {
        // Not recognizably v4 or v6 (e.g. a hostname): both rotations move.
        &[RecordFamily::A, RecordFamily::Aaaa]
    }
}
