use httpdns_application::{
    DegradationFilter, LocalDnsPort, NetworkWatchPort, QueryTransport, RequestSigner,
    ResolveAnswer, SpeedProbePort,
};
use httpdns_domain::{
    HostRecord, HttpDnsConfig, HttpDnsError, QueryFamily, RecordFamily, ResolveRequest,
};
use httpdns_infrastructure::{
    acquire_context, release_context, BootstrapRefresher, ChangeCallback, HmacSigner,
    HttpQueryTransport, RecordCache, ResolverEngine, ServerScheduler, SharedContext, SystemLocalDns,
    WatchKind,
};
use httpdns_jobs::{EndpointRefreshJob, JobRunner, NetworkWatchJob, SpeedProbeJob};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const STATE_INIT: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_STOPPING: u8 = 2;

/// Builds an [`HttpDnsClient`]. Collaborator overrides exist for testing and
/// embedding; production callers normally set only the config.
pub struct HttpDnsClientBuilder {
    config: HttpDnsConfig,
    transport: Option<Arc<dyn QueryTransport>>,
    local_dns: Option<Arc<dyn LocalDnsPort>>,
    signer: Option<Arc<dyn RequestSigner>>,
    degradation: Option<Arc<dyn DegradationFilter>>,
}

impl HttpDnsClientBuilder {
    pub fn new(config: HttpDnsConfig) -> Self {
        Self {
            config,
            transport: None,
            local_dns: None,
            signer: None,
            degradation: None,
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn QueryTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_local_dns(mut self, local_dns: Arc<dyn LocalDnsPort>) -> Self {
        self.local_dns = Some(local_dns);
        self
    }

    pub fn with_signer(mut self, signer: Arc<dyn RequestSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_degradation_filter(mut self, filter: Arc<dyn DegradationFilter>) -> Self {
        self.degradation = Some(filter);
        self
    }

    pub fn build(self) -> Result<HttpDnsClient, HttpDnsError> {
        self.config.validate()?;
        let context = acquire_context()?;
        let sid = new_session_id();
        let config = Arc::new(self.config);

        let transport: Arc<dyn QueryTransport> = match self.transport {
            Some(custom) => custom,
            None if !config.verify_tls => {
                Arc::new(HttpQueryTransport::with_verification(false)?)
            }
            None => Arc::clone(&context.transport) as Arc<dyn QueryTransport>,
        };
        let local_dns = self
            .local_dns
            .unwrap_or_else(|| Arc::new(SystemLocalDns) as Arc<dyn LocalDnsPort>);
        let signer = self
            .signer
            .unwrap_or_else(|| Arc::new(HmacSigner::new()) as Arc<dyn RequestSigner>);

        let cache = Arc::new(RecordCache::new());
        let probe_port = if config.enable_https { 443 } else { 80 };
        let scheduler = Arc::new(ServerScheduler::new(
            Arc::clone(&context.detector),
            config.initial_resolvers_v4.clone(),
            config.initial_resolvers_v6.clone(),
            probe_port,
        ));
        let engine = Arc::new(ResolverEngine::new(
            Arc::clone(&config),
            Arc::clone(&cache),
            Arc::clone(&scheduler),
            Arc::clone(&context.detector),
            Arc::clone(&transport),
            Arc::clone(&signer),
            Arc::clone(&local_dns),
            self.degradation,
            &sid,
        ));

        let token = context.root_token.child_token();
        info!(sid = %sid, account = %config.account_id, "httpdns client built");
        Ok(HttpDnsClient {
            inner: Arc::new(ClientInner {
                config,
                cache,
                scheduler,
                engine,
                transport,
                signer,
                context,
                token,
                state: AtomicU8::new(STATE_INIT),
                pending_async: AtomicUsize::new(0),
                sid,
            }),
        })
    }
}

struct ClientInner {
    config: Arc<HttpDnsConfig>,
    cache: Arc<RecordCache>,
    scheduler: Arc<ServerScheduler>,
    engine: Arc<ResolverEngine>,
    transport: Arc<dyn QueryTransport>,
    signer: Arc<dyn RequestSigner>,
    context: Arc<SharedContext>,
    /// Child of the context root token; scopes this client's tasks so one
    /// teardown never cancels another client's work.
    token: CancellationToken,
    state: AtomicU8,
    pending_async: AtomicUsize,
    sid: String,
}

/// The SDK entry point. Owns its config, cache and scheduler exclusively;
/// shares the process-wide context (transport pool, network detector, task
/// tracker) with other clients through reference counting.
#[derive(Clone)]
pub struct HttpDnsClient {
    inner: Arc<ClientInner>,
}

impl HttpDnsClient {
    pub fn builder(config: HttpDnsConfig) -> HttpDnsClientBuilder {
        HttpDnsClientBuilder::new(config)
    }

    pub fn session_id(&self) -> &str {
        &self.inner.sid
    }

    /// Launch background jobs (endpoint refresh, network watch, speed-probe
    /// dispatch), register net-change callbacks and kick off pre-resolution.
    /// Idempotent while running; fails once stopping.
    pub async fn start(&self) -> Result<(), HttpDnsError> {
        let inner = &self.inner;
        match inner.state.compare_exchange(
            STATE_INIT,
            STATE_RUNNING,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {}
            Err(STATE_RUNNING) => return Ok(()),
            Err(_) => {
                return Err(self.stamp(HttpDnsError::resolve_fail("client is stopping")));
            }
        }

        // Process-wide detector loops start exactly once per context, bound
        // to the root token so they outlive individual clients.
        if inner
            .context
            .detector_loops_started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let watcher = Arc::clone(inner.context.detector.watcher());
            let prober = Arc::clone(inner.context.detector.prober());
            JobRunner::new()
                .with_network_watch(NetworkWatchJob::new(watcher as Arc<dyn NetworkWatchPort>))
                .with_speed_probe(SpeedProbeJob::new(prober as Arc<dyn SpeedProbePort>))
                .with_shutdown_token(inner.context.root_token.clone())
                .start()
                .await;
        }

        // Per-client refresh loop against this client's scheduler.
        let refresher = Arc::new(BootstrapRefresher::new(
            Arc::clone(&inner.config),
            Arc::clone(&inner.transport),
            Arc::clone(&inner.signer),
            Arc::clone(&inner.scheduler),
            &inner.sid,
        ));
        JobRunner::new()
            .with_endpoint_refresh(EndpointRefreshJob::new(refresher))
            .with_shutdown_token(inner.token.clone())
            .start()
            .await;

        self.register_net_callbacks();
        self.spawn_initial_detection();
        self.spawn_pre_resolve();

        info!(sid = %inner.sid, "httpdns client started");
        Ok(())
    }

    fn register_net_callbacks(&self) {
        let inner = &self.inner;
        let watcher = inner.context.detector.watcher();

        let detector = Arc::clone(&inner.context.detector);
        let probe_domain = inner.config.probe_domain.clone();
        let redetect: ChangeCallback = Arc::new(move || {
            let detector = Arc::clone(&detector);
            let probe_domain = probe_domain.clone();
            Box::pin(async move {
                detector.redetect_stack(&probe_domain).await;
            })
        });
        watcher.register(&inner.sid, WatchKind::StackRedetect, inner.token.clone(), redetect);

        if inner.config.renew_cache_on_net_change {
            let engine = Arc::clone(&inner.engine);
            let renew: ChangeCallback = Arc::new(move || {
                let engine = Arc::clone(&engine);
                Box::pin(async move {
                    engine.renew_cached_keys().await;
                })
            });
            watcher.register(&inner.sid, WatchKind::CacheRenew, inner.token.clone(), renew);
        }
    }

    fn spawn_initial_detection(&self) {
        let detector = Arc::clone(&self.inner.context.detector);
        if detector.cached_stack().is_known() {
            return;
        }
        let probe_domain = self.inner.config.probe_domain.clone();
        self.inner.context.tracker.spawn(async move {
            detector.detect_stack(&probe_domain).await;
        });
    }

    fn spawn_pre_resolve(&self) {
        if self.inner.config.pre_resolve_hosts.is_empty() {
            return;
        }
        let engine = Arc::clone(&self.inner.engine);
        let hosts = self.inner.config.pre_resolve_hosts.clone();
        let token = self.inner.token.clone();
        self.inner.context.tracker.spawn(async move {
            let request = ResolveRequest::batch(hosts).with_family(QueryFamily::Both);
            tokio::select! {
                _ = token.cancelled() => {}
                result = engine.resolve_many(&request) => {
                    if let Err(e) = result {
                        warn!(error = %e, "pre-resolve failed");
                    }
                }
            }
        });
    }

    /// Resolve a single host, blocking the caller until an answer or a
    /// final error.
    pub async fn resolve(&self, request: ResolveRequest) -> Result<ResolveAnswer, HttpDnsError> {
        self.ensure_running()?;
        self.inner
            .engine
            .resolve_one(&request)
            .await
            .map_err(|e| self.stamp(e))
    }

    /// Resolve a batch of hosts.
    pub async fn resolve_batch(
        &self,
        request: ResolveRequest,
    ) -> Result<Vec<ResolveAnswer>, HttpDnsError> {
        self.ensure_running()?;
        self.inner
            .engine
            .resolve_many(&request)
            .await
            .map_err(|e| self.stamp(e))
    }

    /// Non-blocking resolve. Admission is checked before anything is
    /// spawned: past the cap the call fails immediately with `ResolveFail`
    /// and no task is enqueued. The returned handle resolves exactly once,
    /// also on failure or cancellation.
    pub fn resolve_background(
        &self,
        request: ResolveRequest,
    ) -> Result<ResolveHandle, HttpDnsError> {
        self.ensure_running()?;
        let inner = &self.inner;
        let cap = inner.config.max_async_tasks;
        let admitted = inner
            .pending_async
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |pending| {
                (pending < cap).then_some(pending + 1)
            })
            .is_ok();
        if !admitted {
            return Err(self.stamp(HttpDnsError::resolve_fail(format!(
                "too many async tasks (cap {cap})"
            ))));
        }

        let (tx, rx) = oneshot::channel();
        let engine = Arc::clone(&inner.engine);
        let token = inner.token.clone();
        let sid = inner.sid.clone();
        let guard = PendingGuard(Arc::clone(&self.inner));
        inner.context.tracker.spawn(async move {
            let _guard = guard;
            let result = tokio::select! {
                _ = token.cancelled() => {
                    Err(HttpDnsError::resolve_fail("client stopped before resolution finished")
                        .with_session(&*sid))
                }
                result = engine.resolve_one(&request) => {
                    result.map_err(|e| e.with_session(&*sid))
                }
            };
            let _ = tx.send(result);
        });
        Ok(ResolveHandle { rx })
    }

    /// Current depth of the async admission queue.
    pub fn pending_async_tasks(&self) -> usize {
        self.inner.pending_async.load(Ordering::Acquire)
    }

    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }

    pub fn cached_record(&self, key: &str, family: RecordFamily) -> Option<HostRecord> {
        self.inner.cache.get(key, family)
    }

    pub fn cache_len(&self) -> usize {
        self.inner.cache.len()
    }

    /// Move to Stopping: reject new work, cancel this client's callbacks and
    /// tasks, then release the shared context after a grace delay so async
    /// resolutions already holding references can finish first.
    pub fn stop(&self) {
        let inner = &self.inner;
        let previous = inner.state.swap(STATE_STOPPING, Ordering::AcqRel);
        if previous == STATE_STOPPING {
            return;
        }
        info!(sid = %inner.sid, "httpdns client stopping");
        inner.context.detector.watcher().unregister_owner(&inner.sid);
        inner.token.cancel();

        let grace = Duration::from_millis(inner.config.teardown_grace_ms);
        let held = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            debug!(sid = %held.sid, "httpdns client resources released");
            drop(held);
            release_context();
        });
    }

    fn ensure_running(&self) -> Result<(), HttpDnsError> {
        match self.inner.state.load(Ordering::Acquire) {
            STATE_RUNNING => Ok(()),
            STATE_INIT => Err(self.stamp(HttpDnsError::resolve_fail("client not started"))),
            _ => Err(self.stamp(HttpDnsError::resolve_fail("client is stopping"))),
        }
    }

    fn stamp(&self, error: HttpDnsError) -> HttpDnsError {
        if error.session.is_empty() {
            error.with_session(&*self.inner.sid)
        } else {
            error
        }
    }
}

/// Completion handle for a background resolve; the underlying channel is
/// written exactly once.
#[derive(Debug)]
pub struct ResolveHandle {
    rx: oneshot::Receiver<Result<ResolveAnswer, HttpDnsError>>,
}

impl ResolveHandle {
    pub async fn await_answer(self) -> Result<ResolveAnswer, HttpDnsError> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(HttpDnsError::resolve_fail(
                "background resolution dropped without an answer",
            )),
        }
    }
}

struct PendingGuard(Arc<ClientInner>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.pending_async.fetch_sub(1, Ordering::AcqRel);
    }
}

fn new_session_id() -> String {
    (0..12).map(|_| fastrand::alphanumeric()).collect()
}
