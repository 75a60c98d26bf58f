use crate::errors::HttpDnsError;
use crate::record::QueryFamily;
use std::collections::BTreeMap;

/// Query-string keys the engine fills in itself; callers may not shadow them
/// through extra params.
pub const RESERVED_PARAM_KEYS: &[&str] = &[
    "host",
    "query",
    "platform",
    "sdk_version",
    "sid",
    "ip",
    "s",
    "t",
    "n",
    "region",
];

const DEFAULT_TIMEOUT_MS: u64 = 2_500;
const DEFAULT_RETRY_TIMES: u32 = 1;
const MAX_HOST_LEN: usize = 255;

/// One resolve call's inputs. Owned by the caller for the duration of the
/// call; the engine clones what it needs to keep (async retry, probing).
#[derive(Debug, Clone)]
pub struct ResolveRequest {
    pub hosts: Vec<String>,
    pub family: QueryFamily,
    pub client_ip: Option<String>,
    /// Custom cache key, distinct from host. Only meaningful for single-host
    /// requests carrying SDNS params.
    pub cache_key: Option<String>,
    /// SDNS params appended to the query string. Ordered so URL building is
    /// deterministic.
    pub extra_params: BTreeMap<String, String>,
    pub use_cache: bool,
    pub retry_times: u32,
    pub timeout_ms: u64,
}

impl ResolveRequest {
    /// Single-host request. A comma-joined batch string is accepted and
    /// split, matching the wire form.
    pub fn new(host: impl AsRef<str>) -> Self {
        let hosts = host
            .as_ref()
            .split(',')
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .collect();
        Self::batch(hosts)
    }

    pub fn batch(hosts: Vec<String>) -> Self {
        Self {
            hosts,
            family: QueryFamily::Auto,
            client_ip: None,
            cache_key: None,
            extra_params: BTreeMap::new(),
            use_cache: true,
            retry_times: DEFAULT_RETRY_TIMES,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn with_family(mut self, family: QueryFamily) -> Self {
        self.family = family;
        self
    }

    pub fn with_client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = Some(ip.into());
        self
    }

    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.insert(key.into(), value.into());
        self
    }

    pub fn with_use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn with_retry_times(mut self, retry_times: u32) -> Self {
        self.retry_times = retry_times;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Effective cache key for one host of this request.
    pub fn cache_key_for(&self, host: &str) -> String {
        match &self.cache_key {
            Some(key) if self.hosts.len() == 1 => key.clone(),
            _ => host.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), HttpDnsError> {
        if self.hosts.is_empty() {
            return Err(HttpDnsError::invalid_argument("no host given"));
        }
        for host in &self.hosts {
            validate_host(host)?;
        }
        if self.timeout_ms == 0 {
            return Err(HttpDnsError::invalid_argument("timeout must be non-zero"));
        }
        for key in self.extra_params.keys() {
            if RESERVED_PARAM_KEYS.contains(&key.as_str()) {
                return Err(HttpDnsError::invalid_argument(format!(
                    "extra param uses reserved key '{key}'"
                )));
            }
        }
        Ok(())
    }
}

fn validate_host(host: &str) -> Result<(), HttpDnsError> {
    if host.is_empty() {
        return Err(HttpDnsError::invalid_argument("empty host"));
    }
    if host.len() > MAX_HOST_LEN {
        return Err(HttpDnsError::invalid_argument(format!(
            "host too long: {host}"
        )));
    }
    let ok = host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    if !ok {
        return Err(HttpDnsError::invalid_argument(format!(
            "host contains invalid characters: {host}"
        )));
    }
    Ok(())
}
