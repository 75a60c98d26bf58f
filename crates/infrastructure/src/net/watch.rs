use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::BoxFuture;
use httpdns_application::{NetworkWatchPort, WatchOutcome};
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// What a registered callback reacts to; registration is deduplicated by
/// (owner, kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchKind {
    StackRedetect,
    CacheRenew,
}

pub type ChangeCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

struct Registration {
    callback: ChangeCallback,
    /// Non-zero while the callback runs; a change observed meanwhile is
    /// dropped for this callback instead of piling up behind it.
    in_flight: Arc<AtomicUsize>,
    token: CancellationToken,
}

/// Polls the local source-address set and fires registered callbacks on a
/// genuine change. The very first observation only establishes a baseline.
///
/// The address set is observed by connecting unbound UDP sockets toward
/// well-known anycast addresses and reading the chosen source address; a
/// network transition changes that source set.
pub struct ChangeWatcher {
    registry: DashMap<(String, WatchKind), Registration>,
    baseline: Mutex<Option<BTreeSet<IpAddr>>>,
}

impl ChangeWatcher {
    pub fn new() -> Self {
        Self {
            registry: DashMap::new(),
            baseline: Mutex::new(None),
        }
    }

    /// Register a callback. Registering the same (owner, kind) twice is a
    /// no-op.
    pub fn register(
        &self,
        owner: &str,
        kind: WatchKind,
        token: CancellationToken,
        callback: ChangeCallback,
    ) {
        let key = (owner.to_string(), kind);
        if self.registry.contains_key(&key) {
            return;
        }
        self.registry.insert(
            key,
            Registration {
                callback,
                in_flight: Arc::new(AtomicUsize::new(0)),
                token,
            },
        );
        debug!(owner, kind = ?kind, "net-change callback registered");
    }

    /// Drop and cancel every callback registered by this owner.
    pub fn unregister_owner(&self, owner: &str) {
        let keys: Vec<_> = self
            .registry
            .iter()
            .map(|e| e.key().clone())
            .filter(|(o, _)| o == owner)
            .collect();
        for key in keys {
            if let Some((_, reg)) = self.registry.remove(&key) {
                reg.token.cancel();
            }
        }
    }

    pub fn registered(&self, owner: &str, kind: WatchKind) -> bool {
        self.registry.contains_key(&(owner.to_string(), kind))
    }

    fn fire_all(&self) {
        for entry in self.registry.iter() {
            let reg = entry.value();
            if reg.token.is_cancelled() {
                continue;
            }
            if reg
                .in_flight
                .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                debug!(owner = %entry.key().0, kind = ?entry.key().1, "callback still running, skipped");
                continue;
            }
            let in_flight = Arc::clone(&reg.in_flight);
            let token = reg.token.clone();
            let fut = (reg.callback)();
            tokio::spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = fut => {}
                }
                in_flight.store(0, Ordering::Release);
            });
        }
    }

    /// Compare the current local-address set to the previous observation
    /// (size and membership, not order) and fire callbacks on change.
    pub async fn observe(&self) -> WatchOutcome {
        let current = observe_local_addrs().await;
        self.observe_set(current)
    }

    fn observe_set(&self, current: BTreeSet<IpAddr>) -> WatchOutcome {
        let addresses = current.len();
        let changed = {
            let mut baseline = self.baseline.lock().expect("watcher mutex poisoned");
            match baseline.as_ref() {
                // First observation: baseline only, nothing to have changed from.
                None => {
                    *baseline = Some(current);
                    false
                }
                Some(previous) if *previous == current => false,
                Some(_) => {
                    *baseline = Some(current);
                    true
                }
            }
        };
        if changed {
            info!(addresses, "local address set changed");
            self.fire_all();
        }
        WatchOutcome { changed, addresses }
    }
}

impl Default for ChangeWatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkWatchPort for ChangeWatcher {
    async fn observe_once(&self) -> WatchOutcome {
        self.observe().await
    }
}

async fn observe_local_addrs() -> BTreeSet<IpAddr> {
    let mut set = BTreeSet::new();
    if let Some(ip) = source_addr_toward("0.0.0.0:0", "8.8.8.8:53").await {
        set.insert(ip);
    }
    if let Some(ip) = source_addr_toward("[::]:0", "[2001:4860:4860::8888]:53").await {
        set.insert(ip);
    }
    set
}

async fn source_addr_toward(bind: &str, target: &str) -> Option<IpAddr> {
    let socket = UdpSocket::bind(bind).await.ok()?;
    socket.connect(target).await.ok()?;
    socket.local_addr().ok().map(|a| a.ip())
}
