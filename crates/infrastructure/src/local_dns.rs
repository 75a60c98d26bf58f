use async_trait::async_trait;
use httpdns_application::LocalDnsPort;
use httpdns_domain::HttpDnsError;
use std::net::IpAddr;
use std::time::Duration;

/// Platform resolver via `tokio::net::lookup_host`.
pub struct SystemLocalDns;

#[async_trait]
impl LocalDnsPort for SystemLocalDns {
    async fn lookup(&self, host: &str, timeout: Duration) -> Result<Vec<IpAddr>, HttpDnsError> {
        let target = format!("{host}:80");
        let addrs = tokio::time::timeout(timeout, tokio::net::lookup_host(&target))
            .await
            .map_err(|_| HttpDnsError::resolve_fail(format!("local lookup of {host} timed out")))?
            .map_err(|e| {
                HttpDnsError::resolve_fail(format!("local lookup of {host} failed: {e}"))
            })?;

        let mut out: Vec<IpAddr> = Vec::new();
        for addr in addrs {
            let ip = addr.ip();
            if !out.contains(&ip) {
                out.push(ip);
            }
        }
        if out.is_empty() {
            return Err(HttpDnsError::resolve_fail(format!(
                "local lookup of {host} returned no addresses"
            )));
        }
        Ok(out)
    }
}
