use async_trait::async_trait;
use httpdns_domain::HttpDnsError;
use std::time::Duration;

/// What one refresh cycle applied.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefreshOutcome {
    pub v4_applied: usize,
    pub v6_applied: usize,
}

/// Port driving the resolver-endpoint refresh loop.
#[async_trait]
pub trait EndpointRefreshPort: Send + Sync {
    /// Time until the next refresh is due. Zero means due now.
    fn refresh_due_in(&self) -> Duration;

    /// Resolves when an on-demand refresh was requested, e.g. because a
    /// failover walked off the end of an endpoint list.
    async fn refresh_requested(&self);

    async fn run_refresh_cycle(&self) -> Result<RefreshOutcome, HttpDnsError>;
}
