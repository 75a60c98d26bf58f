/// Signature attached to `sign_d` / `sign_resolve` / `ss` requests as
/// `s=<signature>&t=<timestamp>`.
#[derive(Debug, Clone)]
pub struct Signature {
    pub signature: String,
    pub timestamp: u64,
}

/// Port for the signing collaborator.
pub trait RequestSigner: Send + Sync {
    fn sign(&self, payload: &str, secret: &str) -> Signature;
}
