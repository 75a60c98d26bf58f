mod helpers;

use helpers::{base_config, engine_with, MockLocalDns, MockTransport, DUAL_REPLY};
use httpdns_application::WireReply;
use httpdns_domain::{
    now_unix_secs, ErrorKind, HostRecord, HttpDnsError, QueryFamily, RecordFamily, ResolveRequest,
};
use std::sync::Arc;

fn expired_record(host: &str, ips: &[&str]) -> HostRecord {
    let mut record = HostRecord::new(host, RecordFamily::A);
    record.ips = ips.iter().map(|s| s.to_string()).collect();
    record.ttl = 60;
    record.query_time = now_unix_secs() - 3600;
    record
}

#[tokio::test]
async fn test_scenario_a_one_fetch_then_cache_hits() {
    let transport = MockTransport::always(DUAL_REPLY);
    let harness = engine_with(base_config(), transport.clone(), None);

    let request = ResolveRequest::new("www.example.com");
    let answer = harness.engine.resolve_one(&request).await.unwrap();
    assert_eq!(transport.call_count(), 1);
    assert_eq!(
        answer.ipv4.as_ref().unwrap().ips,
        vec!["93.184.216.34", "93.184.216.35"]
    );
    assert_eq!(answer.ipv6.as_ref().unwrap().ips, vec!["2606:2800:220:1::1"]);

    // Both families are now cached.
    assert!(harness.cache.get("www.example.com", RecordFamily::A).is_some());
    assert!(harness.cache.get("www.example.com", RecordFamily::Aaaa).is_some());

    // Second call inside the TTL window: zero live fetches.
    let again = harness.engine.resolve_one(&request).await.unwrap();
    assert_eq!(transport.call_count(), 1);
    assert!(!again.is_empty());
}

#[tokio::test]
async fn test_scenario_b_no_cache_means_always_fetch() {
    let transport = MockTransport::always(DUAL_REPLY);
    let harness = engine_with(base_config(), transport.clone(), None);

    let request = ResolveRequest::new("www.example.com").with_use_cache(false);
    harness.engine.resolve_one(&request).await.unwrap();
    harness.engine.resolve_one(&request).await.unwrap();

    assert_eq!(transport.call_count(), 2);
    // The cache was never consulted nor populated.
    assert_eq!(harness.cache.len(), 0);
}

#[tokio::test]
async fn test_scenario_c_failover_exactly_retry_times() {
    let transport = MockTransport::unreachable();
    let harness = engine_with(base_config(), transport.clone(), None);

    let request = ResolveRequest::new("www.example.com").with_retry_times(2);
    let err = harness.engine.resolve_one(&request).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::ResolveFail);

    // retry_times + 1 attempts were made...
    assert_eq!(transport.call_count(), 3);
    // ...but failover ran exactly retry_times times: the cursor sits two
    // endpoints past the head.
    assert_eq!(harness.scheduler.current().unwrap(), "203.0.113.3");
}

#[tokio::test]
async fn test_scenario_d_local_dns_fallback_is_marked() {
    let mut config = base_config();
    config.enable_local_dns_fallback = true;
    let transport = MockTransport::unreachable();
    let local = Arc::new(MockLocalDns(vec![
        "93.184.216.34".parse().unwrap(),
        "2606:2800:220:1::1".parse().unwrap(),
    ]));
    let harness = engine_with(config, transport, Some(local));

    let request = ResolveRequest::new("www.example.com").with_family(QueryFamily::Both);
    let answer = harness.engine.resolve_one(&request).await.unwrap();

    assert!(answer.from_local_dns());
    assert!(!answer.is_empty());
    assert_eq!(answer.ipv4.unwrap().ips, vec!["93.184.216.34"]);
    assert_eq!(answer.ipv6.unwrap().ips, vec!["2606:2800:220:1::1"]);
}

#[tokio::test]
async fn test_fetch_failure_without_fallbacks_fails_immediately() {
    let transport = MockTransport::unreachable();
    let harness = engine_with(base_config(), transport, None);

    let err = harness
        .engine
        .resolve_one(&ResolveRequest::new("www.example.com"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ResolveFail);
}

#[tokio::test]
async fn test_expired_entry_served_when_allowed() {
    let mut config = base_config();
    config.allow_expired_ip = true;
    let transport = MockTransport::unreachable();
    let harness = engine_with(config, transport, None);

    harness.cache.add(expired_record("www.example.com", &["198.51.100.1"]));

    let request = ResolveRequest::new("www.example.com").with_family(QueryFamily::V4);
    let answer = harness.engine.resolve_one(&request).await.unwrap();
    assert_eq!(answer.ipv4.unwrap().ips, vec!["198.51.100.1"]);
}

#[tokio::test]
async fn test_expired_entry_rejected_when_not_allowed() {
    let transport = MockTransport::unreachable();
    let harness = engine_with(base_config(), transport, None);

    harness.cache.add(expired_record("www.example.com", &["198.51.100.1"]));

    let request = ResolveRequest::new("www.example.com").with_family(QueryFamily::V4);
    assert!(harness.engine.resolve_one(&request).await.is_err());
}

#[tokio::test]
async fn test_empty_endpoint_list_is_schedule_fail_with_no_exchange() {
    let mut config = base_config();
    config.initial_resolvers_v4.clear();
    let transport = MockTransport::always(DUAL_REPLY);
    let harness = engine_with(config, transport.clone(), None);

    let err = harness
        .engine
        .resolve_one(&ResolveRequest::new("www.example.com"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ScheduleFail);
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_verification_rejection_aborts_without_retry() {
    let transport = MockTransport::scripted(vec![Ok(WireReply {
        status: 403,
        body: "invalid signature".into(),
    })]);
    let harness = engine_with(base_config(), transport.clone(), None);

    let request = ResolveRequest::new("www.example.com").with_retry_times(3);
    let err = harness.engine.resolve_one(&request).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::FailedVerification);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_server_transient_error_fails_over_and_retries() {
    let transport = MockTransport::scripted(vec![
        Ok(WireReply {
            status: 502,
            body: String::new(),
        }),
        Ok(WireReply {
            status: 200,
            body: DUAL_REPLY.into(),
        }),
    ]);
    let harness = engine_with(base_config(), transport.clone(), None);

    let request = ResolveRequest::new("www.example.com").with_retry_times(1);
    let answer = harness.engine.resolve_one(&request).await.unwrap();
    assert!(!answer.is_empty());
    assert_eq!(transport.call_count(), 2);
    // The second attempt hit the next endpoint in rotation.
    let urls = transport.urls.lock().unwrap();
    assert!(urls[0].contains("203.0.113.1"));
    assert!(urls[1].contains("203.0.113.2"));
}

#[tokio::test]
async fn test_custom_cache_key_scopes_entry() {
    let transport = MockTransport::always(DUAL_REPLY);
    let harness = engine_with(base_config(), transport.clone(), None);

    let request = ResolveRequest::new("www.example.com")
        .with_cache_key("www.example.com#edge")
        .with_param("sdns-scope", "edge");
    harness.engine.resolve_one(&request).await.unwrap();

    assert!(harness
        .cache
        .get("www.example.com#edge", RecordFamily::A)
        .is_some());
    assert!(harness.cache.get("www.example.com", RecordFamily::A).is_none());
    // Custom keys are invisible to batch renewal.
    assert!(harness.cache.list_keys(RecordFamily::A, true).is_empty());

    // The SDNS param went out on the wire.
    let urls = transport.urls.lock().unwrap();
    assert!(urls[0].contains("sdns-scope=edge"));
}

#[tokio::test]
async fn test_batch_groups_and_chunks_requests() {
    let batch_body = r#"{"dns":[
        {"host":"a.example","ttl":60,"ips":["192.0.2.1"],"ipsv6":["2001:db8::1"]},
        {"host":"b.example","ttl":60,"ips":["192.0.2.2"],"ipsv6":["2001:db8::2"]},
        {"host":"c.example","ttl":60,"ips":["192.0.2.3"],"ipsv6":["2001:db8::3"]},
        {"host":"d.example","ttl":60,"ips":["192.0.2.4"],"ipsv6":["2001:db8::4"]},
        {"host":"e.example","ttl":60,"ips":["192.0.2.5"],"ipsv6":["2001:db8::5"]},
        {"host":"f.example","ttl":60,"ips":["192.0.2.6"],"ipsv6":["2001:db8::6"]},
        {"host":"g.example","ttl":60,"ips":["192.0.2.7"],"ipsv6":["2001:db8::7"]}
    ]}"#;
    let transport = MockTransport::always(batch_body);
    let harness = engine_with(base_config(), transport.clone(), None);

    let hosts: Vec<String> = ["a", "b", "c", "d", "e", "f", "g"]
        .iter()
        .map(|h| format!("{h}.example"))
        .collect();
    let request = ResolveRequest::batch(hosts).with_family(QueryFamily::Both);
    let answers = harness.engine.resolve_many(&request).await.unwrap();

    assert_eq!(answers.len(), 7);
    // Seven hosts needing both families: chunked 5 + 2.
    assert_eq!(transport.call_count(), 2);
    let urls = transport.urls.lock().unwrap();
    assert!(urls[0].contains("/resolve?host=a.example,b.example,c.example,d.example,e.example&"));
    assert!(urls[1].contains("/resolve?host=f.example,g.example&"));
    assert!(urls[0].contains("query=4,6"));

    for answer in &answers {
        assert!(!answer.is_empty());
    }
}

#[tokio::test]
async fn test_batch_fetches_only_invalid_hosts() {
    // The remaining group holds a single host, so the engine issues a
    // single-host query for it.
    let transport = MockTransport::always(
        r#"{"host":"b.example","ttl":60,"ips":["192.0.2.2"],"ipsv6":["2001:db8::2"]}"#,
    );
    let harness = engine_with(base_config(), transport.clone(), None);

    // a.example is already valid for both families.
    for family in [RecordFamily::A, RecordFamily::Aaaa] {
        let mut record = HostRecord::new("a.example", family);
        record.ips = vec!["192.0.2.1".into()];
        record.ttl = 300;
        harness.cache.add(record);
    }

    let request = ResolveRequest::batch(vec!["a.example".into(), "b.example".into()])
        .with_family(QueryFamily::Both);
    let answers = harness.engine.resolve_many(&request).await.unwrap();

    assert_eq!(answers.len(), 2);
    assert_eq!(transport.call_count(), 1);
    let urls = transport.urls.lock().unwrap();
    assert!(urls[0].contains("host=b.example&"));
    assert!(!urls[0].contains("a.example"));
    assert_eq!(answers[0].ipv4.as_ref().unwrap().ips, vec!["192.0.2.1"]);
    assert_eq!(answers[1].ipv4.as_ref().unwrap().ips, vec!["192.0.2.2"]);
}

#[tokio::test]
async fn test_ttl_override_applies_to_fetched_records() {
    let mut config = base_config();
    config.ttl_overrides.insert("www.example.com".into(), 600);
    let transport = MockTransport::always(DUAL_REPLY);
    let harness = engine_with(config, transport, None);

    harness
        .engine
        .resolve_one(&ResolveRequest::new("www.example.com"))
        .await
        .unwrap();

    let cached = harness.cache.get("www.example.com", RecordFamily::A).unwrap();
    assert_eq!(cached.ttl, 600);
    assert_eq!(cached.origin_ttl, 0);
}

#[tokio::test]
async fn test_renew_cached_keys_reissues_plain_hosts_only() {
    let transport = MockTransport::always(DUAL_REPLY);
    let harness = engine_with(base_config(), transport.clone(), None);

    // One plain entry, one custom-key entry.
    harness.engine.resolve_one(&ResolveRequest::new("www.example.com")).await.unwrap();
    harness
        .engine
        .resolve_one(
            &ResolveRequest::new("www.example.com")
                .with_cache_key("www.example.com#edge")
                .with_param("sdns-scope", "edge"),
        )
        .await
        .unwrap();
    let calls_before = transport.call_count();

    harness.engine.renew_cached_keys().await;

    // One batch re-resolve for the plain key; the custom key is dropped,
    // not re-issued.
    assert_eq!(transport.call_count(), calls_before + 1);
    let urls = transport.urls.lock().unwrap();
    let last = urls.last().unwrap();
    assert!(last.contains("host=www.example.com&"));
    assert!(!last.contains("%23edge"));
    assert!(harness
        .cache
        .get("www.example.com#edge", RecordFamily::A)
        .is_none());
}

#[tokio::test]
async fn test_single_reply_with_empty_v6_gives_placeholder() {
    let transport = MockTransport::always(
        r#"{"host":"www.example.com","ttl":60,"ips":["93.184.216.34"],"ipsv6":[]}"#,
    );
    let harness = engine_with(base_config(), transport, None);

    let request = ResolveRequest::new("www.example.com").with_family(QueryFamily::Both);
    let answer = harness.engine.resolve_one(&request).await.unwrap();

    assert_eq!(answer.ipv4.as_ref().unwrap().ips, vec!["93.184.216.34"]);
    let v6 = answer.ipv6.as_ref().unwrap();
    assert!(v6.ips.is_empty());
    assert!(!v6.from_local_dns);
}

#[tokio::test]
async fn test_transport_error_then_success_uses_failover_endpoint() {
    let transport = MockTransport::scripted(vec![
        Err(HttpDnsError::internal("connect refused")),
        Ok(WireReply {
            status: 200,
            body: DUAL_REPLY.into(),
        }),
    ]);
    let harness = engine_with(base_config(), transport.clone(), None);

    let request = ResolveRequest::new("www.example.com").with_retry_times(1);
    let answer = harness.engine.resolve_one(&request).await.unwrap();
    assert!(!answer.is_empty());

    let urls = transport.urls.lock().unwrap();
    assert!(urls[0].contains("203.0.113.1"));
    assert!(urls[1].contains("203.0.113.2"));
}
