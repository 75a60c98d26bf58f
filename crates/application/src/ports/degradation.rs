/// Caller-supplied hook deciding per host whether to bypass HTTPDNS and use
/// the platform resolver directly.
pub trait DegradationFilter: Send + Sync {
    fn should_degrade(&self, host: &str) -> bool;
}
