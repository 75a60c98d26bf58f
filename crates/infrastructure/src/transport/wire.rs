use httpdns_application::Signature;
use httpdns_domain::{HostRecord, HttpDnsConfig, HttpDnsError, RecordFamily, SDK_VERSION};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Builds the service URLs. Path and parameter layout are service protocol,
/// preserved exactly:
///
/// ```text
/// GET /{account}/d?host=H&query=Q&platform=P&sdk_version=V&sid=S[&ip=I][&custom]
/// GET /{account}/sign_d?...&s=<signature>&t=<timestamp>
/// GET /{account}/resolve | /{account}/sign_resolve   (host comma-joined)
/// GET /{account}/ss?region=R&platform=P&sdk_version=V&sid=S[&s=&t=&n=]
/// ```
pub struct QueryUrlBuilder {
    scheme: &'static str,
    account: String,
    platform: String,
    region: String,
    sid: String,
}

impl QueryUrlBuilder {
    pub fn new(config: &HttpDnsConfig, sid: &str) -> Self {
        Self {
            scheme: config.scheme(),
            account: config.account_id.clone(),
            platform: config.platform.clone(),
            region: config.region.clone(),
            sid: sid.to_string(),
        }
    }

    pub fn single(
        &self,
        server: &str,
        host: &str,
        query_code: &str,
        client_ip: Option<&str>,
        extras: &BTreeMap<String, String>,
        signature: Option<&Signature>,
    ) -> String {
        let path = if signature.is_some() { "sign_d" } else { "d" };
        self.query_url(self.scheme, server, path, host, query_code, client_ip, extras, signature)
    }

    pub fn multi(
        &self,
        server: &str,
        joined_hosts: &str,
        query_code: &str,
        client_ip: Option<&str>,
        extras: &BTreeMap<String, String>,
        signature: Option<&Signature>,
    ) -> String {
        let path = if signature.is_some() {
            "sign_resolve"
        } else {
            "resolve"
        };
        self.query_url(
            self.scheme,
            server,
            path,
            joined_hosts,
            query_code,
            client_ip,
            extras,
            signature,
        )
    }

    /// Endpoint-list refresh. Always over secure transport, whatever the
    /// query scheme is.
    pub fn bootstrap(&self, boot_server: &str, signature: Option<&Signature>) -> String {
        let mut url = format!(
            "https://{}/{}/ss?region={}&platform={}&sdk_version={}&sid={}",
            boot_server,
            self.account,
            encode(&self.region),
            encode(&self.platform),
            SDK_VERSION,
            self.sid,
        );
        if let Some(sig) = signature {
            let _ = write!(
                url,
                "&s={}&t={}&n={:08x}",
                sig.signature,
                sig.timestamp,
                fastrand::u32(..)
            );
        }
        url
    }

    #[allow(clippy::too_many_arguments)]
    fn query_url(
        &self,
        scheme: &str,
        server: &str,
        path: &str,
        host: &str,
        query_code: &str,
        client_ip: Option<&str>,
        extras: &BTreeMap<String, String>,
        signature: Option<&Signature>,
    ) -> String {
        let mut url = format!(
            "{}://{}/{}/{}?host={}&query={}&platform={}&sdk_version={}&sid={}",
            scheme,
            server,
            self.account,
            path,
            encode(host),
            encode(query_code),
            encode(&self.platform),
            SDK_VERSION,
            self.sid,
        );
        if let Some(ip) = client_ip {
            let _ = write!(url, "&ip={}", encode(ip));
        }
        for (key, value) in extras {
            let _ = write!(url, "&{}={}", encode(key), encode(value));
        }
        if let Some(sig) = signature {
            let _ = write!(url, "&s={}&t={}", sig.signature, sig.timestamp);
        }
        url
    }
}

/// Minimal percent-encoding of query components: everything outside the
/// URL-unreserved set is escaped.
fn encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b',' => {
                out.push(byte as char)
            }
            _ => {
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
    out
}

/// One host's answer as the service encodes it.
#[derive(Debug, Clone, Deserialize)]
pub struct SingleHostReply {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub client_ip: Option<String>,
    #[serde(default)]
    pub ttl: u64,
    #[serde(default)]
    pub origin_ttl: u64,
    #[serde(default)]
    pub extra: Option<serde_json::Value>,
    #[serde(default)]
    pub ips: Option<Vec<String>>,
    #[serde(default)]
    pub ipsv6: Option<Vec<String>>,
    #[serde(rename = "type", default)]
    pub query_type: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct MultiHostReply {
    #[serde(default)]
    dns: Vec<SingleHostReply>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceListReply {
    #[serde(default)]
    pub service_ip: Option<Vec<String>>,
    #[serde(default)]
    pub service_ipv6: Option<Vec<String>>,
}

pub fn parse_single(body: &str) -> Result<SingleHostReply, HttpDnsError> {
    serde_json::from_str(body)
        .map_err(|e| HttpDnsError::internal(format!("unparseable resolve response: {e}")))
}

pub fn parse_multi(body: &str) -> Result<Vec<SingleHostReply>, HttpDnsError> {
    let reply: MultiHostReply = serde_json::from_str(body)
        .map_err(|e| HttpDnsError::internal(format!("unparseable batch response: {e}")))?;
    Ok(reply.dns)
}

pub fn parse_service_list(body: &str) -> Result<ServiceListReply, HttpDnsError> {
    serde_json::from_str(body)
        .map_err(|e| HttpDnsError::internal(format!("unparseable endpoint-list response: {e}")))
}

/// Turn one reply into cacheable records, one per family the reply carries.
/// A per-host TTL override replaces `ttl`; `origin_ttl` keeps the server's
/// baseline. The caller passes the host, which wins over the reply's own
/// (possibly absent) `host` field.
pub fn records_from_reply(
    reply: &SingleHostReply,
    host: &str,
    cache_key: &str,
    ttl_override: Option<u64>,
    now: u64,
) -> Vec<HostRecord> {
    let extra = reply.extra.as_ref().map(|v| match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    });
    let mut records = Vec::with_capacity(2);
    let families = [
        (RecordFamily::A, reply.ips.as_ref()),
        (RecordFamily::Aaaa, reply.ipsv6.as_ref()),
    ];
    for (family, ips) in families {
        let Some(ips) = ips else { continue };
        records.push(HostRecord {
            host: host.to_string(),
            cache_key: cache_key.to_string(),
            family,
            ips: ips.clone(),
            ttl: ttl_override.unwrap_or(reply.ttl),
            origin_ttl: reply.origin_ttl,
            query_time: now,
            extra: extra.clone(),
            from_local_dns: false,
        });
    }
    records
}
