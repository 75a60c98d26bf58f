use async_trait::async_trait;
use httpdns_application::{LocalDnsPort, QueryTransport, WireReply};
use httpdns_domain::{HttpDnsConfig, HttpDnsError};
use httpdns_infrastructure::{
    HmacSigner, NetworkDetector, RecordCache, ResolverEngine, ServerScheduler, SystemLocalDns,
};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Transport answering from a script, recording every exchange.
pub struct MockTransport {
    replies: Mutex<Vec<Result<WireReply, HttpDnsError>>>,
    /// When the script runs dry, keep returning this.
    fallback: Option<WireReply>,
    pub calls: AtomicUsize,
    pub urls: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn scripted(replies: Vec<Result<WireReply, HttpDnsError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies),
            fallback: None,
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        })
    }

    /// Always answer 200 with the given body.
    pub fn always(body: &str) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(Vec::new()),
            fallback: Some(WireReply {
                status: 200,
                body: body.to_string(),
            }),
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        })
    }

    /// Every exchange fails at the transport level.
    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(Vec::new()),
            fallback: None,
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryTransport for MockTransport {
    async fn get(&self, url: &str, _timeout: Duration) -> Result<WireReply, HttpDnsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());
        let mut replies = self.replies.lock().unwrap();
        if !replies.is_empty() {
            return replies.remove(0);
        }
        match &self.fallback {
            Some(reply) => Ok(reply.clone()),
            None => Err(HttpDnsError::internal("connect refused")),
        }
    }
}

/// Platform resolver stub with a fixed answer.
pub struct MockLocalDns(pub Vec<IpAddr>);

#[async_trait]
impl LocalDnsPort for MockLocalDns {
    async fn lookup(&self, host: &str, _timeout: Duration) -> Result<Vec<IpAddr>, HttpDnsError> {
        if self.0.is_empty() {
            return Err(HttpDnsError::resolve_fail(format!(
                "local lookup of {host} returned no addresses"
            )));
        }
        Ok(self.0.clone())
    }
}

pub struct EngineHarness {
    pub engine: ResolverEngine,
    pub cache: Arc<RecordCache>,
    pub scheduler: Arc<ServerScheduler>,
}

pub fn base_config() -> HttpDnsConfig {
    let mut config = HttpDnsConfig::new("139450");
    config.initial_resolvers_v4 = vec![
        "203.0.113.1".into(),
        "203.0.113.2".into(),
        "203.0.113.3".into(),
        "203.0.113.4".into(),
        "203.0.113.5".into(),
    ];
    config
}

pub fn engine_with(
    config: HttpDnsConfig,
    transport: Arc<dyn QueryTransport>,
    local_dns: Option<Arc<dyn LocalDnsPort>>,
) -> EngineHarness {
    let config = Arc::new(config);
    let cache = Arc::new(RecordCache::new());
    let detector = Arc::new(NetworkDetector::new(Arc::new(SystemLocalDns)));
    let scheduler = Arc::new(ServerScheduler::new(
        Arc::clone(&detector),
        config.initial_resolvers_v4.clone(),
        config.initial_resolvers_v6.clone(),
        443,
    ));
    let engine = ResolverEngine::new(
        Arc::clone(&config),
        Arc::clone(&cache),
        Arc::clone(&scheduler),
        detector,
        transport,
        Arc::new(HmacSigner::new()),
        local_dns.unwrap_or_else(|| Arc::new(SystemLocalDns)),
        None,
        "sid12345",
    );
    EngineHarness {
        engine,
        cache,
        scheduler,
    }
}

pub const DUAL_REPLY: &str = r#"{"host":"www.example.com","client_ip":"198.51.100.7",
    "ttl":60,"origin_ttl":0,"ips":["93.184.216.34","93.184.216.35"],
    "ipsv6":["2606:2800:220:1::1"],"type":1}"#;
