//! Service configuration with defaults for dispatch and queue draining.

use std::time::Duration;

/// Default number of queue items drained by one Process-Queue call.
pub const DEFAULT_DRAIN_LIMIT: usize = 10;

/// Service-level configuration: dispatch behaviour and queue draining.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Upper bound on a single outbound call to a module, in milliseconds.
    pub dispatch_timeout_ms: u64,
    /// Host the registered modules listen on. Modules only report a port.
    pub module_host: String,
    /// Answer calls to port-less modules with a tagged stub result instead of
    /// a dispatch error.
    pub stub_fallback: bool,
    /// Limit used when Process-Queue is called without one, and by auto-drain.
    pub default_drain_limit: usize,
    /// When set, the drain worker empties up to `default_drain_limit` items
    /// on this interval without waiting for Process-Queue.
    pub queue_drain_interval_ms: Option<u64>,
}

impl ServerConfig {
    #[must_use]
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            dispatch_timeout_ms: 5_000,
            module_host: "localhost".to_string(),
            stub_fallback: true,
            default_drain_limit: DEFAULT_DRAIN_LIMIT,
            queue_drain_interval_ms: None,
        }
    }
}
