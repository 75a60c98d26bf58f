use async_trait::async_trait;

/// Result of one watcher tick.
#[derive(Debug, Clone, Copy)]
pub struct WatchOutcome {
    pub changed: bool,
    pub addresses: usize,
}

/// Port for the network-change watcher. One call observes the local address
/// set once, compares it to the previous observation and fires registered
/// callbacks on a genuine change.
#[async_trait]
pub trait NetworkWatchPort: Send + Sync {
    async fn observe_once(&self) -> WatchOutcome;
}
