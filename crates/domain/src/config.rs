use crate::errors::HttpDnsError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Client configuration. Field defaults follow serde `default` functions so a
/// config deserialized from a partial document is always complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpDnsConfig {
    /// Account identifier, the first path segment of every wire request.
    pub account_id: String,

    /// Shared secret for signed requests (`sign_d` / `sign_resolve`).
    #[serde(default)]
    pub secret: Option<String>,

    #[serde(default)]
    pub sign_requests: bool,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default = "default_platform")]
    pub platform: String,

    /// Query resolver endpoints over HTTPS. Bootstrap requests are HTTPS
    /// regardless of this flag.
    #[serde(default = "default_true")]
    pub enable_https: bool,

    /// When false, TLS peer verification is relaxed for IP-literal
    /// endpoints whose certificates cannot match the URL authority.
    #[serde(default = "default_true")]
    pub verify_tls: bool,

    #[serde(default = "default_true")]
    pub enable_cache: bool,

    /// Serve stale cache entries when a live fetch fails.
    #[serde(default)]
    pub allow_expired_ip: bool,

    /// Fall back to the platform resolver when a live fetch fails.
    #[serde(default)]
    pub enable_local_dns_fallback: bool,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_retry_times")]
    pub retry_times: u32,

    /// Bootstrap servers answering `/ss`, tried in order.
    #[serde(default)]
    pub boot_servers: Vec<String>,

    /// Resolver endpoints used until the first successful refresh.
    #[serde(default)]
    pub initial_resolvers_v4: Vec<String>,

    #[serde(default)]
    pub initial_resolvers_v6: Vec<String>,

    /// Hosts resolved in the background at start so first lookups hit a
    /// warm cache.
    #[serde(default)]
    pub pre_resolve_hosts: Vec<String>,

    /// Per-host TTL overrides, applied to fetched records.
    #[serde(default)]
    pub ttl_overrides: HashMap<String, u64>,

    /// Hosts registered for IP speed probing, mapped to the port their
    /// service listens on.
    #[serde(default)]
    pub probe_ports: HashMap<String, u16>,

    /// Batch re-resolve all non-custom cache keys after a network change.
    #[serde(default)]
    pub renew_cache_on_net_change: bool,

    /// Domain whose local resolution disambiguates the stack type when the
    /// reachability probes are inconclusive.
    #[serde(default = "default_probe_domain")]
    pub probe_domain: String,

    #[serde(default = "default_max_async_tasks")]
    pub max_async_tasks: usize,

    /// Delay between `stop()` and the release of client resources, so async
    /// resolutions already holding references can finish.
    #[serde(default = "default_teardown_grace_ms")]
    pub teardown_grace_ms: u64,
}

impl HttpDnsConfig {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            secret: None,
            sign_requests: false,
            region: default_region(),
            platform: default_platform(),
            enable_https: true,
            verify_tls: true,
            enable_cache: true,
            allow_expired_ip: false,
            enable_local_dns_fallback: false,
            timeout_ms: default_timeout_ms(),
            retry_times: default_retry_times(),
            boot_servers: Vec::new(),
            initial_resolvers_v4: Vec::new(),
            initial_resolvers_v6: Vec::new(),
            pre_resolve_hosts: Vec::new(),
            ttl_overrides: HashMap::new(),
            probe_ports: HashMap::new(),
            renew_cache_on_net_change: false,
            probe_domain: default_probe_domain(),
            max_async_tasks: default_max_async_tasks(),
            teardown_grace_ms: default_teardown_grace_ms(),
        }
    }

    /// Checked before any network activity; failures surface as
    /// `FailedVerification` without a single request being issued.
    pub fn validate(&self) -> Result<(), HttpDnsError> {
        if self.account_id.is_empty() {
            return Err(HttpDnsError::failed_verification("account_id is empty"));
        }
        if !self
            .account_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(HttpDnsError::failed_verification(format!(
                "account_id contains invalid characters: {}",
                self.account_id
            )));
        }
        if self.sign_requests && self.secret.as_deref().unwrap_or("").is_empty() {
            return Err(HttpDnsError::failed_verification(
                "signing enabled but no secret configured",
            ));
        }
        if self.timeout_ms == 0 {
            return Err(HttpDnsError::failed_verification("timeout_ms must be non-zero"));
        }
        Ok(())
    }

    pub fn scheme(&self) -> &'static str {
        if self.enable_https {
            "https"
        } else {
            "http"
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_region() -> String {
    "global".to_string()
}

fn default_platform() -> String {
    "linux".to_string()
}

fn default_probe_domain() -> String {
    "dns.google".to_string()
}

fn default_timeout_ms() -> u64 {
    2_500
}

fn default_retry_times() -> u32 {
    1
}

fn default_max_async_tasks() -> usize {
    64
}

fn default_teardown_grace_ms() -> u64 {
    30_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_signing_without_secret_fails_verification() {
        let mut config = HttpDnsConfig::new("100000");
        config.sign_requests = true;
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind, ErrorKind::FailedVerification);
    }

    #[test]
    fn test_empty_account_rejected() {
        assert!(HttpDnsConfig::new("").validate().is_err());
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(HttpDnsConfig::new("100000").validate().is_ok());
    }

    #[test]
    fn test_scheme_follows_https_flag() {
        let mut config = HttpDnsConfig::new("100000");
        assert_eq!(config.scheme(), "https");
        config.enable_https = false;
        assert_eq!(config.scheme(), "http");
    }
}
