//! Infrastructure layer: concrete cache, scheduler, network detection,
//! HTTP transport and the resolution engine itself.

pub mod cache;
pub mod local_dns;
pub mod net;
pub mod resolver;
pub mod runtime;
pub mod scheduler;
pub mod transport;

pub use cache::RecordCache;
pub use local_dns::SystemLocalDns;
pub use net::{ChangeCallback, NetworkDetector, ProbeJob, SpeedProbeQueue, WatchKind};
pub use resolver::ResolverEngine;
pub use runtime::{acquire_context, release_context, SharedContext};
pub use scheduler::{BootstrapRefresher, ServerScheduler};
pub use transport::{HmacSigner, HttpQueryTransport, QueryUrlBuilder};
