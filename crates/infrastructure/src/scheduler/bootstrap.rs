use super::ServerScheduler;
use crate::transport::{parse_service_list, QueryUrlBuilder};
use async_trait::async_trait;
use httpdns_application::{
    EndpointRefreshPort, QueryTransport, RefreshOutcome, RequestSigner, Signature,
};
use httpdns_domain::{HttpDnsConfig, HttpDnsError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fetches fresh resolver-endpoint lists from the configured boot servers
/// and applies them to the scheduler. One instance per client, driven by the
/// jobs crate through `EndpointRefreshPort`.
pub struct BootstrapRefresher {
    config: Arc<HttpDnsConfig>,
    transport: Arc<dyn QueryTransport>,
    signer: Arc<dyn RequestSigner>,
    scheduler: Arc<ServerScheduler>,
    urls: QueryUrlBuilder,
}

impl BootstrapRefresher {
    pub fn new(
        config: Arc<HttpDnsConfig>,
        transport: Arc<dyn QueryTransport>,
        signer: Arc<dyn RequestSigner>,
        scheduler: Arc<ServerScheduler>,
        sid: &str,
    ) -> Self {
        let urls = QueryUrlBuilder::new(&config, sid);
        Self {
            config,
            transport,
            signer,
            scheduler,
            urls,
        }
    }

    fn signature(&self) -> Option<Signature> {
        if !self.config.sign_requests {
            return None;
        }
        let secret = self.config.secret.as_deref()?;
        Some(self.signer.sign(&self.config.account_id, secret))
    }
}

#[async_trait]
impl EndpointRefreshPort for BootstrapRefresher {
    fn refresh_due_in(&self) -> Duration {
        self.scheduler.refresh_due_in()
    }

    async fn refresh_requested(&self) {
        self.scheduler.refresh_requested().await;
    }

    /// Try each boot server in order; the first parseable response wins.
    /// A response missing one family leaves that family's list untouched.
    async fn run_refresh_cycle(&self) -> Result<RefreshOutcome, HttpDnsError> {
        if self.config.boot_servers.is_empty() {
            // Nothing to refresh from; stay on the configured lists.
            debug!("no boot servers configured, endpoint refresh disabled");
            self.scheduler.mark_refresh_result(true);
            return Ok(RefreshOutcome::default());
        }

        let timeout = Duration::from_millis(self.config.timeout_ms);
        let signature = self.signature();
        for boot in &self.config.boot_servers {
            let url = self.urls.bootstrap(boot, signature.as_ref());
            let reply = match self.transport.get(&url, timeout).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(boot = %boot, error = %e, "boot server unreachable");
                    continue;
                }
            };
            if !reply.is_success() {
                warn!(boot = %boot, status = reply.status, "boot server rejected refresh");
                continue;
            }
            let list = match parse_service_list(&reply.body) {
                Ok(list) => list,
                Err(e) => {
                    warn!(boot = %boot, error = %e, "boot server response unparseable");
                    continue;
                }
            };

            if list.service_ip.is_none() {
                info!(boot = %boot, "refresh response carried no v4 endpoints");
            }
            if list.service_ipv6.is_none() {
                info!(boot = %boot, "refresh response carried no v6 endpoints");
            }
            let (v4_applied, v6_applied) = self
                .scheduler
                .apply_refresh(list.service_ip, list.service_ipv6);
            self.scheduler.mark_refresh_result(true);
            info!(boot = %boot, v4_applied, v6_applied, "resolver endpoints refreshed");
            return Ok(RefreshOutcome {
                v4_applied,
                v6_applied,
            });
        }

        self.scheduler.mark_refresh_result(false);
        Err(HttpDnsError::schedule_fail(
            "no bootstrap server produced an endpoint list",
        ))
    }
}
