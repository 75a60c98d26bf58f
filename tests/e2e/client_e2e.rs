use async_trait::async_trait;
use httpdns::{ErrorKind, HttpDnsClient, HttpDnsConfig, QueryFamily, RecordFamily, ResolveRequest};
use httpdns_application::{QueryTransport, WireReply};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

const DUAL_REPLY: &str = r#"{"host":"www.example.com","ttl":60,
    "ips":["93.184.216.34"],"ipsv6":["2606:2800:220:1::1"]}"#;

/// Always answers 200 with a fixed body.
struct FixedTransport {
    body: String,
    calls: AtomicUsize,
}

impl FixedTransport {
    fn new(body: &str) -> Arc<Self> {
        Arc::new(Self {
            body: body.to_string(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl QueryTransport for FixedTransport {
    async fn get(&self, _url: &str, _timeout: Duration) -> Result<WireReply, httpdns::HttpDnsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(WireReply {
            status: 200,
            body: self.body.clone(),
        })
    }
}

/// Holds every exchange until a permit is released.
struct GatedTransport {
    gate: Semaphore,
}

impl GatedTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            gate: Semaphore::new(0),
        })
    }

    fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }
}

#[async_trait]
impl QueryTransport for GatedTransport {
    async fn get(&self, _url: &str, _timeout: Duration) -> Result<WireReply, httpdns::HttpDnsError> {
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| httpdns::HttpDnsError::internal("gate closed"))?;
        permit.forget();
        Ok(WireReply {
            status: 200,
            body: DUAL_REPLY.to_string(),
        })
    }
}

/// Every exchange fails at the transport level.
struct DownTransport;

#[async_trait]
impl QueryTransport for DownTransport {
    async fn get(&self, _url: &str, _timeout: Duration) -> Result<WireReply, httpdns::HttpDnsError> {
        Err(httpdns::HttpDnsError::internal("connect refused"))
    }
}

fn test_config() -> HttpDnsConfig {
    let mut config = HttpDnsConfig::new("139450");
    config.initial_resolvers_v4 = vec!["203.0.113.1".into(), "203.0.113.2".into()];
    config.teardown_grace_ms = 50;
    config
}

async fn started_client(
    config: HttpDnsConfig,
    transport: Arc<dyn QueryTransport>,
) -> HttpDnsClient {
    let client = HttpDnsClient::builder(config)
        .with_transport(transport)
        .build()
        .expect("client builds");
    client.start().await.expect("client starts");
    client
}

#[tokio::test]
async fn test_resolve_before_start_is_rejected() {
    let client = HttpDnsClient::builder(test_config())
        .with_transport(FixedTransport::new(DUAL_REPLY) as Arc<dyn QueryTransport>)
        .build()
        .unwrap();
    let err = client
        .resolve(ResolveRequest::new("www.example.com"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ResolveFail);
    client.stop();
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let transport = FixedTransport::new(DUAL_REPLY);
    let client = started_client(test_config(), transport).await;
    client.start().await.unwrap();
    client.stop();
}

#[tokio::test]
async fn test_resolve_and_cache_through_client() {
    let transport = FixedTransport::new(DUAL_REPLY);
    let client = started_client(test_config(), transport.clone()).await;

    // Family pinned so the test is independent of what the stack detector
    // finds on the test host.
    let request = ResolveRequest::new("www.example.com").with_family(QueryFamily::Both);
    let answer = client.resolve(request.clone()).await.unwrap();
    assert_eq!(
        answer.ips(),
        vec!["93.184.216.34".to_string(), "2606:2800:220:1::1".to_string()]
    );
    assert!(client
        .cached_record("www.example.com", RecordFamily::A)
        .is_some());

    client.resolve(request).await.unwrap();
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);

    client.clear_cache();
    assert_eq!(client.cache_len(), 0);
    client.stop();
}

#[tokio::test]
async fn test_background_resolve_completes_and_drains() {
    let transport = FixedTransport::new(DUAL_REPLY);
    let client = started_client(test_config(), transport).await;

    let handle = client
        .resolve_background(ResolveRequest::new("www.example.com"))
        .unwrap();
    let answer = handle.await_answer().await.unwrap();
    assert!(!answer.is_empty());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(client.pending_async_tasks(), 0);
    client.stop();
}

#[tokio::test]
async fn test_admission_cap_rejects_excess_without_enqueueing() {
    let mut config = test_config();
    config.max_async_tasks = 2;
    let transport = GatedTransport::new();
    let client = started_client(config, transport.clone() as Arc<dyn QueryTransport>).await;

    let first = client
        .resolve_background(ResolveRequest::new("a.example"))
        .unwrap();
    let second = client
        .resolve_background(ResolveRequest::new("b.example"))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(client.pending_async_tasks(), 2);

    // Over the cap: immediate ResolveFail, nothing enqueued.
    let err = client
        .resolve_background(ResolveRequest::new("c.example"))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ResolveFail);
    assert_eq!(client.pending_async_tasks(), 2);

    // Unblock the two admitted tasks; the queue drains and admission
    // reopens.
    transport.release(2);
    first.await_answer().await.unwrap();
    second.await_answer().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(client.pending_async_tasks(), 0);
    assert!(client
        .resolve_background(ResolveRequest::new("d.example"))
        .is_ok());
    transport.release(1);
    client.stop();
}

#[tokio::test]
async fn test_stop_rejects_new_work_and_cancels_inflight() {
    let transport = GatedTransport::new();
    let client = started_client(test_config(), transport.clone() as Arc<dyn QueryTransport>).await;

    let inflight = client
        .resolve_background(ResolveRequest::new("www.example.com"))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    client.stop();

    // In-flight work resolves exactly once, with a cancellation error.
    let err = inflight.await_answer().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::ResolveFail);

    // New work is rejected while stopping.
    let err = client
        .resolve(ResolveRequest::new("www.example.com"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ResolveFail);
    assert!(client
        .resolve_background(ResolveRequest::new("www.example.com"))
        .is_err());

    // Stopping twice is a no-op.
    client.stop();
}

#[tokio::test]
async fn test_errors_are_stamped_with_session_id() {
    let client = started_client(test_config(), Arc::new(DownTransport)).await;

    let err = client
        .resolve(ResolveRequest::new("www.example.com"))
        .await
        .unwrap_err();
    assert_eq!(err.session, client.session_id());
    assert!(!err.session.is_empty());
    client.stop();
}

#[tokio::test]
async fn test_clients_share_context_and_survive_peer_teardown() {
    let transport = FixedTransport::new(DUAL_REPLY);
    let first = started_client(test_config(), transport.clone()).await;
    let second = started_client(test_config(), transport.clone()).await;
    assert_ne!(first.session_id(), second.session_id());

    first.stop();
    // Wait past the first client's teardown grace delay.
    tokio::time::sleep(Duration::from_millis(200)).await;

    // The shared context is still alive for the second client.
    let answer = second
        .resolve(ResolveRequest::new("www.example.com"))
        .await
        .unwrap();
    assert!(!answer.is_empty());
    second.stop();
}

#[tokio::test]
async fn test_batch_resolve_through_client() {
    let body = r#"{"dns":[
        {"host":"a.example","ttl":60,"ips":["192.0.2.1"],"ipsv6":[]},
        {"host":"b.example","ttl":60,"ips":["192.0.2.2"],"ipsv6":[]}
    ]}"#;
    let transport = FixedTransport::new(body);
    let client = started_client(test_config(), transport).await;

    let request = ResolveRequest::new("a.example,b.example");
    let answers = client.resolve_batch(request).await.unwrap();
    assert_eq!(answers.len(), 2);
    assert_eq!(answers[0].host, "a.example");
    assert_eq!(answers[1].ipv4.as_ref().unwrap().ips, vec!["192.0.2.2"]);
    client.stop();
}
