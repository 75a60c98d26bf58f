use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Coarse wall-clock seconds used for TTL arithmetic.
pub fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Address family of a resolved record set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordFamily {
    A,
    Aaaa,
}

impl RecordFamily {
    /// Wire query-type code for this family alone.
    pub fn query_code(&self) -> &'static str {
        match self {
            RecordFamily::A => "4",
            RecordFamily::Aaaa => "6",
        }
    }
}

impl fmt::Display for RecordFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordFamily::A => write!(f, "A"),
            RecordFamily::Aaaa => write!(f, "AAAA"),
        }
    }
}

/// What the caller asked for. `Auto` is normalized to a concrete choice via
/// the detected network stack before any cache or wire work happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryFamily {
    V4,
    V6,
    Both,
    Auto,
}

impl QueryFamily {
    pub fn families(&self) -> &'static [RecordFamily] {
        match self {
            QueryFamily::V4 => &[RecordFamily::A],
            QueryFamily::V6 => &[RecordFamily::Aaaa],
            QueryFamily::Both | QueryFamily::Auto => &[RecordFamily::A, RecordFamily::Aaaa],
        }
    }

    pub fn includes(&self, family: RecordFamily) -> bool {
        self.families().contains(&family)
    }
}

/// Wire query-type code for a set of needed families.
pub fn query_code_for(families: &[RecordFamily]) -> &'static str {
    let v4 = families.contains(&RecordFamily::A);
    let v6 = families.contains(&RecordFamily::Aaaa);
    match (v4, v6) {
        (true, false) => "4",
        (false, true) => "6",
        _ => "4,6",
    }
}

/// One resolved record set, as stored in the cache and returned to callers.
#[derive(Debug, Clone)]
pub struct HostRecord {
    pub host: String,
    /// Cache key; equals `host` unless the request carried a custom key.
    pub cache_key: String,
    pub family: RecordFamily,
    /// Ordered IP list; speed probing may reorder it.
    pub ips: Vec<String>,
    /// Cache lifetime in seconds; may be locally overridden per host.
    pub ttl: u64,
    /// Server-declared baseline TTL. Takes precedence over `ttl` for expiry
    /// when non-zero.
    pub origin_ttl: u64,
    /// Unix seconds at which the record was fetched.
    pub query_time: u64,
    /// Opaque payload echoed by the service (SDNS extra).
    pub extra: Option<String>,
    /// True when the record came from local-DNS fallback, not the service.
    pub from_local_dns: bool,
}

impl HostRecord {
    pub fn new(host: impl Into<String>, family: RecordFamily) -> Self {
        let host = host.into();
        Self {
            cache_key: host.clone(),
            host,
            family,
            ips: Vec::new(),
            ttl: 0,
            origin_ttl: 0,
            query_time: now_unix_secs(),
            extra: None,
            from_local_dns: false,
        }
    }

    /// Empty placeholder for a family the service answered with no addresses.
    pub fn placeholder(host: &str, cache_key: &str, family: RecordFamily) -> Self {
        Self {
            host: host.to_string(),
            cache_key: cache_key.to_string(),
            family,
            ips: Vec::new(),
            ttl: 0,
            origin_ttl: 0,
            query_time: now_unix_secs(),
            extra: None,
            from_local_dns: false,
        }
    }

    pub fn effective_ttl(&self) -> u64 {
        if self.origin_ttl > 0 {
            self.origin_ttl
        } else {
            self.ttl
        }
    }

    /// A record is expired once `query_time + effective_ttl` is at or
    /// before `now`.
    pub fn is_expired(&self, now: u64) -> bool {
        self.query_time.saturating_add(self.effective_ttl()) <= now
    }

    pub fn is_empty(&self) -> bool {
        self.ips.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_ttls(ttl: u64, origin_ttl: u64, query_time: u64) -> HostRecord {
        let mut r = HostRecord::new("example.com", RecordFamily::A);
        r.ips = vec!["1.2.3.4".into()];
        r.ttl = ttl;
        r.origin_ttl = origin_ttl;
        r.query_time = query_time;
        r
    }

    #[test]
    fn test_origin_ttl_takes_precedence_when_nonzero() {
        let r = record_with_ttls(600, 60, 1000);
        assert!(!r.is_expired(1059));
        assert!(r.is_expired(1060));
    }

    #[test]
    fn test_ttl_used_when_origin_ttl_zero() {
        let r = record_with_ttls(120, 0, 1000);
        assert!(!r.is_expired(1119));
        assert!(r.is_expired(1120));
    }

    #[test]
    fn test_expired_exactly_at_boundary() {
        let r = record_with_ttls(30, 0, 500);
        assert!(r.is_expired(530));
    }

    #[test]
    fn test_query_code_for_family_sets() {
        assert_eq!(query_code_for(&[RecordFamily::A]), "4");
        assert_eq!(query_code_for(&[RecordFamily::Aaaa]), "6");
        assert_eq!(query_code_for(&[RecordFamily::A, RecordFamily::Aaaa]), "4,6");
    }
}
