//! Interop service facade.
//!
//! Owns the registry, dispatcher and message queue, validates incoming
//! requests, and is the one entry point the HTTP and realtime handlers use.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use interop_core::messages::{QueueSubmitRequest, RegisterRequest, RpcRequest};
use interop_core::{ClockSource, ModuleRecord, QueueItem, SystemClock};
use serde_json::Value;

use super::config::ServerConfig;
use super::dispatcher::{Dispatch, DispatchOutcome, Dispatcher};
use super::error::InteropError;
use super::non_empty;
use super::queue::MessageQueue;
use super::registry::ModuleRegistry;

/// The interop server's state: registry, queue, and the dispatcher that
/// connects them.
///
/// One instance is created per process and shared behind an `Arc` by the
/// HTTP handlers, the realtime channel, and the drain worker. Each entry
/// point goes through the same `dispatch` path.
pub struct InteropService {
    registry: Arc<ModuleRegistry>,
    queue: MessageQueue,
    dispatcher: Dispatcher,
    config: ServerConfig,
    clock: Arc<dyn ClockSource>,
}

impl InteropService {
    /// Creates an empty service reading the system clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the outbound HTTP client cannot be constructed.
    pub fn new(config: ServerConfig) -> anyhow::Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates an empty service with an injected clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the outbound HTTP client cannot be constructed.
    pub fn with_clock(config: ServerConfig, clock: Arc<dyn ClockSource>) -> anyhow::Result<Self> {
        let registry = Arc::new(ModuleRegistry::with_clock(Arc::clone(&clock)));
        let dispatcher =
            Dispatcher::with_clock(Arc::clone(&registry), &config, Arc::clone(&clock))?;
        Ok(Self {
            registry,
            queue: MessageQueue::with_clock(Arc::clone(&clock)),
            dispatcher,
            config,
            clock,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    #[must_use]
    pub fn queue(&self) -> &MessageQueue {
        &self.queue
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // -- registry ----------------------------------------------------------

    /// # Errors
    ///
    /// `InvalidRequest` if `name` or `language` is missing.
    pub fn register(&self, request: RegisterRequest) -> Result<ModuleRecord, InteropError> {
        self.registry.register(request)
    }

    /// # Errors
    ///
    /// `NotFound` if the module is not registered.
    pub fn unregister(&self, name: &str) -> Result<ModuleRecord, InteropError> {
        self.registry.unregister(name)
    }

    #[must_use]
    pub fn modules(&self) -> Vec<ModuleRecord> {
        self.registry.list()
    }

    // -- dispatch ----------------------------------------------------------

    /// Validates a synchronous call request and dispatches it.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` for a missing `target` or `method`, otherwise any
    /// error from [`InteropService::dispatch`].
    pub async fn call(&self, request: RpcRequest) -> Result<DispatchOutcome, InteropError> {
        let (target, method) = require_target_and_method(request.target, request.method)?;
        self.dispatch(&target, &method, request.params.unwrap_or_else(empty_params))
            .await
    }

    /// Resolves `target` and performs the call.
    ///
    /// # Errors
    ///
    /// `ModuleNotFound` if the target is not registered, `Dispatch` if the
    /// module cannot be reached or answers with a failure.
    pub async fn dispatch(
        &self,
        target: &str,
        method: &str,
        params: Value,
    ) -> Result<DispatchOutcome, InteropError> {
        self.dispatcher.dispatch(target, method, params).await
    }

    // -- queue -------------------------------------------------------------

    /// Validates and enqueues an asynchronous call, returning the message id.
    ///
    /// The target does not have to be registered yet; that is only checked
    /// when the item is drained.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` for a missing `target` or `method`.
    pub fn send(&self, request: QueueSubmitRequest) -> Result<String, InteropError> {
        let (target, method) = require_target_and_method(request.target, request.method)?;
        Ok(self.queue.enqueue(
            target,
            method,
            request.params.unwrap_or_else(empty_params),
            request.priority.unwrap_or(0),
        ))
    }

    #[must_use]
    pub fn queue_snapshot(&self) -> Vec<QueueItem> {
        self.queue.peek_all()
    }

    /// Drains up to `limit` queued calls through the dispatcher.
    pub async fn process_queue(&self, limit: usize) -> Vec<QueueItem> {
        self.queue.drain(&self.dispatcher, limit).await
    }
}

fn require_target_and_method(
    target: Option<String>,
    method: Option<String>,
) -> Result<(String, String), InteropError> {
    match (non_empty(target), non_empty(method)) {
        (Some(target), Some(method)) => Ok((target, method)),
        (target, method) => {
            let mut missing = Vec::with_capacity(2);
            if target.is_none() {
                missing.push("target");
            }
            if method.is_none() {
                missing.push("method");
            }
            Err(InteropError::missing_fields(&missing))
        }
    }
}

fn empty_params() -> Value {
    Value::Object(serde_json::Map::new())
}
