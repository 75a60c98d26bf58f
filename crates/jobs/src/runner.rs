use crate::{EndpointRefreshJob, NetworkWatchJob, SpeedProbeJob};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub trait SpawnableJob: Send + 'static {
    fn with_cancellation(self, token: CancellationToken) -> Self;
    fn start_job(self: Arc<Self>) -> tokio::task::JoinHandle<()>;
}

macro_rules! impl_spawnable_job {
    ($t:ty) => {
        impl SpawnableJob for $t {
            fn with_cancellation(self, token: CancellationToken) -> Self {
                self.with_cancellation(token)
            }

            fn start_job(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
                tokio::spawn(async move { self.start().await })
            }
        }
    };
}

impl_spawnable_job!(EndpointRefreshJob);
impl_spawnable_job!(NetworkWatchJob);
impl_spawnable_job!(SpeedProbeJob);

fn spawn_job<J: SpawnableJob>(job: Option<J>, shutdown: &Option<CancellationToken>) {
    if let Some(job) = job {
        let job = match shutdown {
            Some(token) => job.with_cancellation(token.clone()),
            None => job,
        };
        Arc::new(job).start_job();
    }
}

/// Composes the client's background jobs and spawns them together.
pub struct JobRunner {
    endpoint_refresh: Option<EndpointRefreshJob>,
    network_watch: Option<NetworkWatchJob>,
    speed_probe: Option<SpeedProbeJob>,
    shutdown: Option<CancellationToken>,
}

impl JobRunner {
    pub fn new() -> Self {
        Self {
            endpoint_refresh: None,
            network_watch: None,
            speed_probe: None,
            shutdown: None,
        }
    }

    pub fn with_endpoint_refresh(mut self, job: EndpointRefreshJob) -> Self {
        self.endpoint_refresh = Some(job);
        self
    }

    pub fn with_network_watch(mut self, job: NetworkWatchJob) -> Self {
        self.network_watch = Some(job);
        self
    }

    pub fn with_speed_probe(mut self, job: SpeedProbeJob) -> Self {
        self.speed_probe = Some(job);
        self
    }

    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    pub async fn start(self) {
        info!("starting httpdns background jobs");

        spawn_job(self.endpoint_refresh, &self.shutdown);
        spawn_job(self.network_watch, &self.shutdown);
        spawn_job(self.speed_probe, &self.shutdown);
    }
}

impl Default for JobRunner {
    fn default() -> Self {
        Self::new()
    }
}
