use crate::cache::RecordCache;
use crate::net::{NetworkDetector, ProbeJob};
use crate::scheduler::ServerScheduler;
use crate::transport::{
    parse_multi, parse_single, records_from_reply, QueryUrlBuilder, SingleHostReply,
};
use httpdns_application::{
    DegradationFilter, LocalDnsPort, QueryTransport, RequestSigner, ResolveAnswer, Signature,
};
use httpdns_domain::{
    now_unix_secs, query_code_for, HostRecord, HttpDnsConfig, HttpDnsError, QueryFamily,
    RecordFamily, ResolveRequest,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Upper bound on hosts per batch HTTP request; larger groups are chunked.
const MAX_BATCH_HOSTS: usize = 5;
/// TTL given to records built from local-DNS fallback.
const LOCAL_DNS_TTL: u64 = 60;

/// The orchestrator: ties cache lookup, live fetch-with-retry and fallback
/// policy together. One per client; everything it composes is injected.
pub struct ResolverEngine {
    config: Arc<HttpDnsConfig>,
    cache: Arc<RecordCache>,
    scheduler: Arc<ServerScheduler>,
    detector: Arc<NetworkDetector>,
    transport: Arc<dyn QueryTransport>,
    signer: Arc<dyn RequestSigner>,
    local_dns: Arc<dyn LocalDnsPort>,
    degradation: Option<Arc<dyn DegradationFilter>>,
    urls: QueryUrlBuilder,
}

impl ResolverEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<HttpDnsConfig>,
        cache: Arc<RecordCache>,
        scheduler: Arc<ServerScheduler>,
        detector: Arc<NetworkDetector>,
        transport: Arc<dyn QueryTransport>,
        signer: Arc<dyn RequestSigner>,
        local_dns: Arc<dyn LocalDnsPort>,
        degradation: Option<Arc<dyn DegradationFilter>>,
        sid: &str,
    ) -> Self {
        let urls = QueryUrlBuilder::new(&config, sid);
        Self {
            config,
            cache,
            scheduler,
            detector,
            transport,
            signer,
            local_dns,
            degradation,
            urls,
        }
    }

    pub fn cache(&self) -> &Arc<RecordCache> {
        &self.cache
    }

    /// Resolve a single host.
    pub async fn resolve_one(&self, request: &ResolveRequest) -> Result<ResolveAnswer, HttpDnsError> {
        request.validate()?;
        if request.hosts.len() != 1 {
            return Err(HttpDnsError::invalid_argument(
                "resolve_one takes exactly one host",
            ));
        }
        let host = request.hosts[0].clone();

        if self.should_degrade(&host) {
            return self.degraded_answer(&host, request).await;
        }

        let families = self.normalized_families(request.family);
        let key = request.cache_key_for(&host);
        let use_cache = request.use_cache && self.config.enable_cache;

        // Only families without a valid cache entry are fetched; when all
        // are valid no network call happens at all.
        let need: Vec<RecordFamily> = if use_cache {
            families
                .iter()
                .copied()
                .filter(|family| !self.cache_valid(&key, *family))
                .collect()
        } else {
            families.to_vec()
        };

        let mut fetched = Vec::new();
        let mut fetch_err = None;
        if !need.is_empty() {
            match self
                .fetch_with_retry(std::slice::from_ref(&host), &need, request, use_cache)
                .await
            {
                Ok(records) => fetched = records,
                Err(e) => fetch_err = Some(e),
            }
        }
        if let Some(e) = fetch_err.as_ref() {
            if !self.config.allow_expired_ip && !self.config.enable_local_dns_fallback {
                return Err(e.clone());
            }
        }

        self.assemble_answer(&host, &key, families, &fetched, use_cache, fetch_err)
            .await
    }

    /// Resolve a batch of hosts with the same per-family validity
    /// partitioning as the single-host path. Hosts are grouped by which
    /// families they still need and fetched in bounded sub-batches.
    pub async fn resolve_many(
        &self,
        request: &ResolveRequest,
    ) -> Result<Vec<ResolveAnswer>, HttpDnsError> {
        request.validate()?;
        let families = self.normalized_families(request.family);
        let use_cache = request.use_cache && self.config.enable_cache;

        let mut need_v4: Vec<String> = Vec::new();
        let mut need_v6: Vec<String> = Vec::new();
        let mut need_both: Vec<String> = Vec::new();
        for host in &request.hosts {
            if self.should_degrade(host) {
                continue;
            }
            let key = request.cache_key_for(host);
            let needs_a = families.contains(&RecordFamily::A)
                && (!use_cache || !self.cache_valid(&key, RecordFamily::A));
            let needs_aaaa = families.contains(&RecordFamily::Aaaa)
                && (!use_cache || !self.cache_valid(&key, RecordFamily::Aaaa));
            match (needs_a, needs_aaaa) {
                (true, true) => need_both.push(host.clone()),
                (true, false) => need_v4.push(host.clone()),
                (false, true) => need_v6.push(host.clone()),
                (false, false) => {}
            }
        }

        let mut fetched: Vec<HostRecord> = Vec::new();
        let mut fetch_err: Option<HttpDnsError> = None;
        let groups: [(&[String], &[RecordFamily]); 3] = [
            (need_v4.as_slice(), &[RecordFamily::A]),
            (need_v6.as_slice(), &[RecordFamily::Aaaa]),
            (need_both.as_slice(), &[RecordFamily::A, RecordFamily::Aaaa]),
        ];
        for (group, group_families) in groups {
            for chunk in group.chunks(MAX_BATCH_HOSTS) {
                match self
                    .fetch_with_retry(chunk, group_families, request, use_cache)
                    .await
                {
                    Ok(mut records) => fetched.append(&mut records),
                    Err(e) => {
                        fetch_err.get_or_insert(e);
                    }
                }
            }
        }
        if let Some(e) = fetch_err.as_ref() {
            if !self.config.allow_expired_ip && !self.config.enable_local_dns_fallback {
                return Err(e.clone());
            }
        }

        let mut answers = Vec::with_capacity(request.hosts.len());
        for host in &request.hosts {
            if self.should_degrade(host) {
                answers.push(self.degraded_answer(host, request).await?);
                continue;
            }
            let key = request.cache_key_for(host);
            let answer = self
                .assemble_answer(host, &key, families, &fetched, use_cache, fetch_err.clone())
                .await?;
            answers.push(answer);
        }
        Ok(answers)
    }

    /// Re-resolve every non-custom cache key after a network change. Custom
    /// keys are parameterized queries and are not blindly re-issued; the
    /// whole cache is dropped first because pre-change addresses are
    /// suspect on the new network.
    pub async fn renew_cached_keys(&self) {
        let mut hosts = self.cache.list_keys(RecordFamily::A, true);
        for key in self.cache.list_keys(RecordFamily::Aaaa, true) {
            if !hosts.contains(&key) {
                hosts.push(key);
            }
        }
        self.cache.clear();
        if hosts.is_empty() {
            return;
        }
        info!(hosts = hosts.len(), "renewing cached hosts after network change");
        let request = ResolveRequest::batch(hosts).with_family(QueryFamily::Both);
        if let Err(e) = self.resolve_many(&request).await {
            warn!(error = %e, "cache renewal after network change failed");
        }
    }

    fn normalized_families(&self, family: QueryFamily) -> &'static [RecordFamily] {
        self.detector.cached_stack().normalize(family).families()
    }

    fn should_degrade(&self, host: &str) -> bool {
        self.degradation
            .as_ref()
            .map(|filter| filter.should_degrade(host))
            .unwrap_or(false)
    }

    fn cache_valid(&self, key: &str, family: RecordFamily) -> bool {
        self.cache
            .get(key, family)
            .map(|entry| !entry.is_expired(now_unix_secs()))
            .unwrap_or(false)
    }

    fn signature(&self, payload: &str) -> Option<Signature> {
        if !self.config.sign_requests {
            return None;
        }
        let secret = self.config.secret.as_deref()?;
        Some(self.signer.sign(payload, secret))
    }

    /// Up to `retry_times + 1` attempts against rotating endpoints. An empty
    /// endpoint list fails immediately: retrying cannot help it within the
    /// same call. Failover runs only while a retry remains.
    async fn fetch_with_retry(
        &self,
        hosts: &[String],
        need: &[RecordFamily],
        request: &ResolveRequest,
        use_cache: bool,
    ) -> Result<Vec<HostRecord>, HttpDnsError> {
        let code = query_code_for(need);
        let joined = hosts.join(",");
        let timeout = Duration::from_millis(request.timeout_ms);
        let attempts = request.retry_times + 1;
        let mut last_err: Option<HttpDnsError> = None;

        for attempt in 0..attempts {
            let endpoint = self.scheduler.current()?;
            let signature = self.signature(&joined);
            let url = if hosts.len() == 1 {
                self.urls.single(
                    &endpoint,
                    &joined,
                    code,
                    request.client_ip.as_deref(),
                    &request.extra_params,
                    signature.as_ref(),
                )
            } else {
                self.urls.multi(
                    &endpoint,
                    &joined,
                    code,
                    request.client_ip.as_deref(),
                    &request.extra_params,
                    signature.as_ref(),
                )
            };

            match self.transport.get(&url, timeout).await {
                Err(e) => {
                    warn!(endpoint = %endpoint, attempt, error = %e, "resolver endpoint unreachable");
                    last_err = Some(e);
                    if attempt + 1 < attempts {
                        self.scheduler.failover(&endpoint);
                    }
                }
                Ok(reply) if reply.is_success() => {
                    let replies: Vec<SingleHostReply> = if hosts.len() == 1 {
                        vec![parse_single(&reply.body)?]
                    } else {
                        parse_multi(&reply.body)?
                    };
                    let records = self.records_from_replies(&replies, &joined, request);
                    if use_cache {
                        for record in &records {
                            self.cache.add(record.clone());
                        }
                        self.enqueue_probes(&records);
                    }
                    debug!(hosts = %joined, records = records.len(), "live fetch succeeded");
                    return Ok(records);
                }
                Ok(reply) if reply.is_retryable() => {
                    warn!(endpoint = %endpoint, status = reply.status, "transient server failure");
                    last_err = Some(HttpDnsError::resolve_fail(format!(
                        "service returned {}",
                        reply.status
                    )));
                    if attempt + 1 < attempts {
                        self.scheduler.failover(&endpoint);
                    }
                }
                Ok(reply) => {
                    let detail = reply.body.chars().take(200).collect::<String>();
                    return Err(match reply.status {
                        401 | 403 => HttpDnsError::failed_verification(format!(
                            "service rejected request ({}): {detail}",
                            reply.status
                        )),
                        status => HttpDnsError::resolve_fail(format!(
                            "service error {status}: {detail}"
                        )),
                    });
                }
            }
        }

        Err(match last_err {
            Some(e) => HttpDnsError::resolve_fail(format!(
                "fetch failed after {attempts} attempts: {}",
                e.message
            )),
            None => HttpDnsError::resolve_fail("fetch failed with no attempt made"),
        })
    }

    fn records_from_replies(
        &self,
        replies: &[SingleHostReply],
        joined_hosts: &str,
        request: &ResolveRequest,
    ) -> Vec<HostRecord> {
        let now = now_unix_secs();
        let mut records = Vec::new();
        for reply in replies {
            let host = if reply.host.is_empty() {
                joined_hosts
            } else {
                reply.host.as_str()
            };
            let key = request.cache_key_for(host);
            let ttl_override = self.config.ttl_overrides.get(host).copied();
            records.extend(records_from_reply(reply, host, &key, ttl_override, now));
        }
        records
    }

    /// Queue a connect-speed ranking for hosts registered for probing; the
    /// callback writes the reordered list back into the cache.
    fn enqueue_probes(&self, records: &[HostRecord]) {
        for record in records {
            let Some(port) = self.config.probe_ports.get(&record.host).copied() else {
                continue;
            };
            if record.ips.len() < 2 {
                continue;
            }
            let cache = Arc::clone(&self.cache);
            let mut reordered = record.clone();
            self.detector.prober().enqueue(ProbeJob {
                label: record.host.clone(),
                ips: record.ips.clone(),
                port,
                on_ranked: Box::new(move |ranked| {
                    reordered.ips = ranked;
                    cache.add(reordered);
                }),
            });
        }
    }

    async fn assemble_answer(
        &self,
        host: &str,
        key: &str,
        families: &[RecordFamily],
        fetched: &[HostRecord],
        use_cache: bool,
        fetch_err: Option<HttpDnsError>,
    ) -> Result<ResolveAnswer, HttpDnsError> {
        let fetch_failed = fetch_err.is_some();
        let mut answer = ResolveAnswer::new(host);
        for family in families {
            let record = self
                .assemble_family(host, key, *family, fetched, use_cache, fetch_failed)
                .await;
            let Some(record) = record else {
                return Err(fetch_err.clone().unwrap_or_else(|| {
                    HttpDnsError::resolve_fail(format!("no source could satisfy {family} for {host}"))
                }));
            };
            match family {
                RecordFamily::A => answer.ipv4 = Some(record),
                RecordFamily::Aaaa => answer.ipv6 = Some(record),
            }
        }
        Ok(answer)
    }

    /// Per-family answer source chain: valid cache entry, else stale entry
    /// (if allowed), else local-DNS fallback (if enabled), else an empty
    /// placeholder when the fetch itself did not fail.
    async fn assemble_family(
        &self,
        host: &str,
        key: &str,
        family: RecordFamily,
        fetched: &[HostRecord],
        use_cache: bool,
        fetch_failed: bool,
    ) -> Option<HostRecord> {
        let mut stale = None;
        if use_cache {
            if let Some(entry) = self.cache.get(key, family) {
                if !entry.is_expired(now_unix_secs()) {
                    return Some(entry);
                }
                stale = Some(entry);
            }
        } else if let Some(record) = fetched
            .iter()
            .find(|r| r.family == family && r.cache_key == key)
        {
            return Some(record.clone());
        }

        if self.config.allow_expired_ip {
            if let Some(entry) = stale {
                debug!(host, family = %family, "serving expired cache entry");
                return Some(entry);
            }
        }

        if self.config.enable_local_dns_fallback {
            if let Some(record) = self.local_fallback(host, key, family, use_cache).await {
                return Some(record);
            }
        }

        if !fetch_failed {
            return Some(HostRecord::placeholder(host, key, family));
        }
        None
    }

    async fn local_fallback(
        &self,
        host: &str,
        key: &str,
        family: RecordFamily,
        use_cache: bool,
    ) -> Option<HostRecord> {
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let addrs = match self.local_dns.lookup(host, timeout).await {
            Ok(addrs) => addrs,
            Err(e) => {
                debug!(host, error = %e, "local-DNS fallback lookup failed");
                return None;
            }
        };
        let ips: Vec<String> = addrs
            .iter()
            .filter(|addr| match family {
                RecordFamily::A => addr.is_ipv4(),
                RecordFamily::Aaaa => addr.is_ipv6(),
            })
            .map(|addr| addr.to_string())
            .collect();
        if ips.is_empty() {
            return None;
        }
        info!(host, family = %family, ips = ips.len(), "answering from local-DNS fallback");
        let mut record = HostRecord::new(host, family);
        record.cache_key = key.to_string();
        record.ips = ips;
        record.ttl = LOCAL_DNS_TTL;
        record.from_local_dns = true;
        if use_cache {
            self.cache.add(record.clone());
        }
        Some(record)
    }

    async fn degraded_answer(
        &self,
        host: &str,
        request: &ResolveRequest,
    ) -> Result<ResolveAnswer, HttpDnsError> {
        debug!(host, "degradation filter bypasses httpdns");
        let families = self.normalized_families(request.family);
        let key = request.cache_key_for(host);
        let mut answer = ResolveAnswer::new(host);
        for family in families {
            let record = self
                .local_fallback(host, &key, *family, false)
                .await
                .unwrap_or_else(|| HostRecord::placeholder(host, &key, *family));
            match family {
                RecordFamily::A => answer.ipv4 = Some(record),
                RecordFamily::Aaaa => answer.ipv6 = Some(record),
            }
        }
        if answer.is_empty() {
            return Err(HttpDnsError::resolve_fail(format!(
                "local resolution of degraded host {host} produced no addresses"
            )));
        }
        Ok(answer)
    }
}
