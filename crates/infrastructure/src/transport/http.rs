use async_trait::async_trait;
use httpdns_application::{QueryTransport, WireReply};
use httpdns_domain::HttpDnsError;
use std::time::Duration;
use tracing::debug;

/// Upper bound independent of per-request timeouts.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);
/// Connect phase gets its own, tighter bound.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// `QueryTransport` over a pooled reqwest client with rustls TLS.
pub struct HttpQueryTransport {
    client: reqwest::Client,
}

impl HttpQueryTransport {
    pub fn new() -> Result<Self, HttpDnsError> {
        Self::with_verification(true)
    }

    /// `verify_tls = false` relaxes peer verification for IP-literal
    /// endpoints whose certificates cannot match the URL authority.
    pub fn with_verification(verify_tls: bool) -> Result<Self, HttpDnsError> {
        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(CLIENT_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(4);
        if !verify_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder
            .build()
            .map_err(|e| HttpDnsError::internal(format!("http client build failed: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl QueryTransport for HttpQueryTransport {
    async fn get(&self, url: &str, timeout: Duration) -> Result<WireReply, HttpDnsError> {
        let response = tokio::time::timeout(
            timeout,
            self.client.get(url).timeout(timeout).send(),
        )
        .await
        .map_err(|_| HttpDnsError::internal(format!("request timed out after {timeout:?}")))?
        .map_err(|e| HttpDnsError::internal(format!("request failed: {e}")))?;

        let status = response.status().as_u16();
        let body = tokio::time::timeout(timeout, response.text())
            .await
            .map_err(|_| HttpDnsError::internal("response body read timed out"))?
            .map_err(|e| HttpDnsError::internal(format!("response body read failed: {e}")))?;

        debug!(status, bytes = body.len(), "httpdns exchange finished");
        Ok(WireReply { status, body })
    }
}
