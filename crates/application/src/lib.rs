//! Application layer: the trait seams between the resolution engine and its
//! collaborators (HTTP transport, signer, platform resolver, background
//! loops). Infrastructure implements these ports; jobs and the client facade
//! consume them.

pub mod ports;

pub use ports::{
    DegradationFilter, EndpointRefreshPort, LocalDnsPort, NetworkWatchPort, QueryTransport,
    RefreshOutcome, RequestSigner, ResolveAnswer, Signature, SpeedProbePort, WatchOutcome,
    WireReply,
};
