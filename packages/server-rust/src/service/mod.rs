//! Interop service layer.
//!
//! 1. **Registry** (`registry`): named modules, their ports and liveness timestamps
//! 2. **Dispatch** (`dispatcher`): resolve a target and call its `/rpc` endpoint
//! 3. **Queue** (`queue`): priority-ordered deferred calls, drained on demand
//! 4. **Facade** (`interop`): the shared state every transport talks to
//! 5. **Background workers** (`worker`): serialized and periodic queue draining

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod interop;
pub mod queue;
pub mod registry;
pub mod worker;

// Re-export key types for convenient access.
pub use config::{ServerConfig, DEFAULT_DRAIN_LIMIT};
pub use dispatcher::{Dispatch, DispatchOrigin, DispatchOutcome, Dispatcher};
pub use error::InteropError;
pub use interop::InteropService;
pub use queue::MessageQueue;
pub use registry::ModuleRegistry;
pub use worker::{BackgroundRunnable, BackgroundWorker, DrainRequest, QueueDrainer};

/// Treats an empty string the same as an absent field.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::non_empty;

    #[test]
    fn non_empty_drops_blank_strings() {
        assert_eq!(non_empty(Some("a".into())), Some("a".into()));
        assert_eq!(non_empty(Some(String::new())), None);
        assert_eq!(non_empty(None), None);
    }
}
