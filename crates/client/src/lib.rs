//! HTTPDNS client SDK: resolves hostnames through a fleet of HTTP resolver
//! endpoints, with TTL caching, endpoint failover and refresh, network-stack
//! detection, IP speed ranking and graceful fallback policies.
//!
//! ```no_run
//! use httpdns::{HttpDnsClient, HttpDnsConfig, ResolveRequest};
//!
//! # async fn run() -> Result<(), httpdns::HttpDnsError> {
//! let mut config = HttpDnsConfig::new("139450");
//! config.boot_servers = vec!["boot.httpdns.example".into()];
//! let client = HttpDnsClient::builder(config).build()?;
//! client.start().await?;
//!
//! let answer = client.resolve(ResolveRequest::new("www.example.com")).await?;
//! println!("{:?}", answer.ips());
//! client.stop();
//! # Ok(())
//! # }
//! ```

mod client;

pub use client::{HttpDnsClient, HttpDnsClientBuilder, ResolveHandle};
pub use httpdns_application::{DegradationFilter, ResolveAnswer};
pub use httpdns_domain::{
    ErrorKind, HostRecord, HttpDnsConfig, HttpDnsError, IpStackType, QueryFamily, RecordFamily,
    ResolveRequest,
};
