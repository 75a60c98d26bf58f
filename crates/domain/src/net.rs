use crate::record::QueryFamily;
use std::fmt;

/// Which address families the current network path supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpStackType {
    Unknown,
    V4,
    V6,
    Dual,
}

impl IpStackType {
    pub fn is_known(&self) -> bool {
        !matches!(self, IpStackType::Unknown)
    }

    pub fn supports_v4(&self) -> bool {
        matches!(self, IpStackType::V4 | IpStackType::Dual)
    }

    pub fn supports_v6(&self) -> bool {
        matches!(self, IpStackType::V6 | IpStackType::Dual)
    }

    /// Normalize an `Auto` request to a concrete family choice.
    ///
    /// Unknown maps to Both: probing both families after a failed detection
    /// never yields a wrongly-empty answer.
    pub fn normalize(&self, family: QueryFamily) -> QueryFamily {
        if family != QueryFamily::Auto {
            return family;
        }
        match self {
            IpStackType::V4 => QueryFamily::V4,
            IpStackType::V6 => QueryFamily::V6,
            IpStackType::Dual | IpStackType::Unknown => QueryFamily::Both,
        }
    }
}

impl fmt::Display for IpStackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IpStackType::Unknown => "unknown",
            IpStackType::V4 => "ipv4",
            IpStackType::V6 => "ipv6",
            IpStackType::Dual => "dual",
        };
        write!(f, "{s}")
    }
}
