use httpdns_application::{RequestSigner, Signature};
use httpdns_domain::now_unix_secs;
use ring::hmac;

/// How far into the future a signature stays valid; the timestamp it covers
/// is sent along as `t`.
const SIGNATURE_EXPIRY_SECS: u64 = 300;

/// HMAC-SHA256 over `{payload}-{t}`, hex-encoded.
pub struct HmacSigner {
    expiry_secs: u64,
}

impl HmacSigner {
    pub fn new() -> Self {
        Self {
            expiry_secs: SIGNATURE_EXPIRY_SECS,
        }
    }
}

impl Default for HmacSigner {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestSigner for HmacSigner {
    fn sign(&self, payload: &str, secret: &str) -> Signature {
        let timestamp = now_unix_secs() + self.expiry_secs;
        let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
        let tag = hmac::sign(&key, format!("{payload}-{timestamp}").as_bytes());
        Signature {
            signature: hex::encode(tag.as_ref()),
            timestamp,
        }
    }
}
