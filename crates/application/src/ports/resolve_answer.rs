use httpdns_domain::HostRecord;

/// Per-host answer assembled by the engine: up to one record per family.
#[derive(Debug, Clone, Default)]
pub struct ResolveAnswer {
    pub host: String,
    pub ipv4: Option<HostRecord>,
    pub ipv6: Option<HostRecord>,
}

impl ResolveAnswer {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ipv4: None,
            ipv6: None,
        }
    }

    /// All addresses in answer order, v4 first.
    pub fn ips(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(r) = &self.ipv4 {
            out.extend(r.ips.iter().cloned());
        }
        if let Some(r) = &self.ipv6 {
            out.extend(r.ips.iter().cloned());
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.ips().is_empty()
    }

    /// True when any record came from local-DNS fallback.
    pub fn from_local_dns(&self) -> bool {
        self.ipv4.as_ref().map(|r| r.from_local_dns).unwrap_or(false)
            || self.ipv6.as_ref().map(|r| r.from_local_dns).unwrap_or(false)
    }
}
