use async_trait::async_trait;
use httpdns_domain::HttpDnsError;
use std::net::IpAddr;
use std::time::Duration;

/// Port for the platform resolver, used for local-DNS fallback and for the
/// dual-stack probe-domain check.
#[async_trait]
pub trait LocalDnsPort: Send + Sync {
    async fn lookup(&self, host: &str, timeout: Duration) -> Result<Vec<IpAddr>, HttpDnsError>;
}
