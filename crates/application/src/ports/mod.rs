mod degradation;
mod endpoint_refresh;
mod local_dns;
mod network_watch;
mod query_transport;
mod request_signer;
mod resolve_answer;
mod speed_probe;

pub use degradation::DegradationFilter;
pub use endpoint_refresh::{EndpointRefreshPort, RefreshOutcome};
pub use local_dns::LocalDnsPort;
pub use network_watch::{NetworkWatchPort, WatchOutcome};
pub use query_transport::{QueryTransport, WireReply};
pub use request_signer::{RequestSigner, Signature};
pub use resolve_answer::ResolveAnswer;
pub use speed_probe::SpeedProbePort;
