//! Request dispatcher: resolves a target module and performs its remote call.
//!
//! This is the single call path behind `POST /rpc`, queue draining, and
//! realtime channel `call` frames.

use std::error::Error as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use interop_core::messages::ModuleRpcRequest;
use interop_core::{ClockSource, SystemClock};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::config::ServerConfig;
use super::error::InteropError;
use super::registry::ModuleRegistry;

// ---------------------------------------------------------------------------
// DispatchOutcome
// ---------------------------------------------------------------------------

/// Where a dispatch result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOrigin {
    /// The target module answered on its own `/rpc` endpoint.
    Remote,
    /// The target has no port; the result was synthesized locally.
    Stub,
}

/// Successful result of a dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    pub result: Value,
    pub origin: DispatchOrigin,
}

impl DispatchOutcome {
    #[must_use]
    pub fn remote(result: Value) -> Self {
        Self {
            result,
            origin: DispatchOrigin::Remote,
        }
    }

    #[must_use]
    pub fn stub(result: Value) -> Self {
        Self {
            result,
            origin: DispatchOrigin::Stub,
        }
    }

    /// Stub results must never be mistaken for a module's real answer.
    #[must_use]
    pub fn is_stub(&self) -> bool {
        self.origin == DispatchOrigin::Stub
    }
}

// ---------------------------------------------------------------------------
// Dispatch trait
// ---------------------------------------------------------------------------

/// Performs a call against a registered module.
#[async_trait]
pub trait Dispatch: Send + Sync {
    /// Resolves `target` and calls `method` with `params`.
    async fn dispatch(
        &self,
        target: &str,
        method: &str,
        params: Value,
    ) -> Result<DispatchOutcome, InteropError>;
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// HTTP dispatcher forwarding calls to each module's own `/rpc` endpoint.
///
/// Calls are not retried. Every outbound request is bounded by the
/// configured dispatch timeout.
pub struct Dispatcher {
    registry: Arc<ModuleRegistry>,
    client: reqwest::Client,
    module_host: String,
    timeout: Duration,
    stub_fallback: bool,
    clock: Arc<dyn ClockSource>,
}

impl Dispatcher {
    /// Creates a dispatcher over `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(registry: Arc<ModuleRegistry>, config: &ServerConfig) -> anyhow::Result<Self> {
        Self::with_clock(registry, config, Arc::new(SystemClock))
    }

    /// Creates a dispatcher with an injected clock for stub timestamps.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn with_clock(
        registry: Arc<ModuleRegistry>,
        config: &ServerConfig,
        clock: Arc<dyn ClockSource>,
    ) -> anyhow::Result<Self> {
        let timeout = config.dispatch_timeout();
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            registry,
            client,
            module_host: config.module_host.clone(),
            timeout,
            stub_fallback: config.stub_fallback,
            clock,
        })
    }

    async fn call_remote(
        &self,
        target: &str,
        port: u16,
        method: &str,
        params: Value,
    ) -> Result<Value, InteropError> {
        let url = format!("http://{}:{port}/rpc", self.module_host);
        let body = ModuleRpcRequest {
            method: method.to_string(),
            params,
        };
        debug!(module = %target, %method, %url, "forwarding call to module");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|err| self.transport_error(target, &err))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(InteropError::Dispatch {
                target: target.to_string(),
                message: format!("module responded with {status}: {}", text.trim()),
            });
        }

        response.json::<Value>().await.map_err(|err| {
            if err.is_timeout() {
                self.transport_error(target, &err)
            } else {
                InteropError::Dispatch {
                    target: target.to_string(),
                    message: format!("module returned invalid JSON: {err}"),
                }
            }
        })
    }

    fn transport_error(&self, target: &str, err: &reqwest::Error) -> InteropError {
        let message = if err.is_timeout() {
            format!("request timed out after {}ms", self.timeout.as_millis())
        } else {
            error_chain(err)
        };
        InteropError::Dispatch {
            target: target.to_string(),
            message,
        }
    }

    fn stub_result(&self, target: &str, method: &str, params: Value) -> Value {
        json!({
            "stub": true,
            "target": target,
            "method": method,
            "params": params,
            "timestamp": self.clock.now(),
        })
    }
}

#[async_trait]
impl Dispatch for Dispatcher {
    async fn dispatch(
        &self,
        target: &str,
        method: &str,
        params: Value,
    ) -> Result<DispatchOutcome, InteropError> {
        let Some(record) = self.registry.touch(target) else {
            debug!(module = %target, %method, "dispatch target not registered");
            metrics::counter!("interop_dispatch_total", "outcome" => "not_found").increment(1);
            return Err(InteropError::ModuleNotFound {
                target: target.to_string(),
            });
        };

        let outcome = match record.port {
            Some(port) => self
                .call_remote(target, port, method, params)
                .await
                .map(DispatchOutcome::remote),
            None if self.stub_fallback => {
                warn!(module = %target, %method, "module has no port; answering with stub result");
                Ok(DispatchOutcome::stub(self.stub_result(target, method, params)))
            }
            None => Err(InteropError::Dispatch {
                target: target.to_string(),
                message: "module has no port and stub fallback is disabled".to_string(),
            }),
        };

        let label = match &outcome {
            Ok(o) if o.is_stub() => "stub",
            Ok(_) => "remote",
            Err(err) => {
                warn!(module = %target, %method, error = %err, "dispatch failed");
                "error"
            }
        };
        metrics::counter!("interop_dispatch_total", "outcome" => label).increment(1);

        outcome
    }
}

/// Flattens an error and its sources into one line, so the root cause
/// (e.g. "Connection refused") survives into the response.
fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
