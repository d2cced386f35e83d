//! HTTP and realtime channel handlers for the interop server.
//!
//! This module defines `AppState` (the shared state carried through axum
//! extractors) and re-exports all handler functions for building the router.

pub mod error;
pub mod health;
pub mod modules;
pub mod queue;
pub mod rpc;
pub mod websocket;

pub use health::{health_handler, liveness_handler, readiness_handler};
pub use modules::{list_modules_handler, register_handler, unregister_handler};
pub use queue::{enqueue_handler, list_queue_handler, process_queue_handler};
pub use rpc::rpc_handler;
pub use websocket::ws_upgrade_handler;

use std::sync::Arc;
use std::time::Instant;

use super::{ConnectionRegistry, NetworkConfig, ShutdownController};
use crate::service::{BackgroundWorker, InteropService, QueueDrainer};

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Holds `Arc` references to shared resources so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Registry, queue and dispatcher.
    pub service: Arc<InteropService>,
    /// Serializes Process-Queue requests.
    pub drainer: Arc<BackgroundWorker<QueueDrainer>>,
    /// Open realtime channel connections.
    pub connections: Arc<ConnectionRegistry>,
    /// Graceful shutdown controller with health state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    pub config: Arc<NetworkConfig>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Builds the state and starts the queue drain worker.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(service: Arc<InteropService>, config: NetworkConfig) -> Self {
        let drainer = Arc::new(QueueDrainer::spawn(Arc::clone(&service)));
        Self {
            service,
            drainer,
            connections: Arc::new(ConnectionRegistry::new()),
            shutdown: Arc::new(ShutdownController::new()),
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }
}
