//! Domain layer of the HTTPDNS client: entities, configuration and errors.
//! No I/O lives here.

pub mod config;
pub mod errors;
pub mod net;
pub mod record;
pub mod request;

pub use config::HttpDnsConfig;
pub use errors::{ErrorKind, HttpDnsError};
pub use net::IpStackType;
pub use record::{now_unix_secs, query_code_for, HostRecord, QueryFamily, RecordFamily};
pub use request::{ResolveRequest, RESERVED_PARAM_KEYS};

/// Reported to the service as `sdk_version` on every request.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");
