use async_trait::async_trait;
use httpdns_domain::HttpDnsError;
use std::time::Duration;

/// What came back from one HTTP exchange with a resolver or boot server.
#[derive(Debug, Clone)]
pub struct WireReply {
    pub status: u16,
    pub body: String,
}

impl WireReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Server-side transient failures are worth a failover and retry.
    pub fn is_retryable(&self) -> bool {
        self.status >= 500
    }
}

/// Port for the HTTP collaborator. An `Err` means the exchange could not be
/// completed at all (connect failure, timeout); an unhappy status code is
/// still an `Ok` reply.
#[async_trait]
pub trait QueryTransport: Send + Sync {
    async fn get(&self, url: &str, timeout: Duration) -> Result<WireReply, HttpDnsError>;
}
