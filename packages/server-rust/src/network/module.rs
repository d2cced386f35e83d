//! Network module with deferred startup lifecycle.
//!
//! `new()` creates the shared state, `start()` binds the TCP listener, and
//! `serve()` starts accepting connections. Binding separately lets callers
//! learn the OS-assigned port before traffic flows.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, post};
use axum::{middleware, Router};
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::connection::{ConnectionRegistry, OutboundMessage};
use super::handlers::{
    enqueue_handler, health_handler, list_modules_handler, list_queue_handler, liveness_handler,
    process_queue_handler, readiness_handler, register_handler, rpc_handler, unregister_handler,
    ws_upgrade_handler, AppState,
};
use super::middleware::{build_http_layers, request_timeout_layer, track_in_flight};
use super::shutdown::ShutdownController;
use crate::service::InteropService;

/// Upper bound on waiting for in-flight calls after shutdown is requested.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Manages the full HTTP/realtime channel server lifecycle.
///
/// 1. `new()` -- allocates shared state and starts the queue drain worker
/// 2. `start()` -- binds TCP listener to the configured address
/// 3. `serve()` -- begins accepting connections until shutdown is signalled
pub struct NetworkModule {
    state: AppState,
    listener: Option<TcpListener>,
}

impl NetworkModule {
    /// Creates a new network module without binding any port.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(config: NetworkConfig, service: Arc<InteropService>) -> Self {
        Self {
            state: AppState::new(service, config),
            listener: None,
        }
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.state.shutdown)
    }

    /// Assembles the axum router with all routes and middleware.
    ///
    /// Routes:
    /// - `GET /health`, `GET /health/live`, `GET /health/ready`
    /// - `POST /register`, `DELETE /register/{name}`, `GET /modules`
    /// - `POST /rpc`
    /// - `POST /queue`, `GET /queue`, `POST /queue/process`
    /// - `GET /` and `GET /ws` -- realtime channel upgrade
    pub fn build_router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Binds the TCP listener to the configured host and port.
    ///
    /// Returns the actual bound port, which differs from the configured
    /// port when port 0 is used.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let config = &self.state.config;
        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&addr).await?;
        let local: SocketAddr = listener.local_addr()?;

        info!(host = %config.host, port = local.port(), "TCP listener bound");

        self.listener = Some(listener);
        Ok(local.port())
    }

    /// Serves until `shutdown` resolves, then drains.
    ///
    /// After the shutdown signal:
    /// 1. Health state transitions to Draining and new API requests get 503
    /// 2. Every realtime channel receives a Close frame
    /// 3. In-flight calls are awaited for up to 30 seconds
    /// 4. The queue drain worker is stopped
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first or the server hits
    /// a fatal I/O error.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let Some(listener) = self.listener else {
            anyhow::bail!("start() must be called before serve()");
        };
        let state = self.state;
        let router = build_router(state.clone());

        let signal_state = state.clone();
        let graceful = async move {
            shutdown.await;
            info!("shutdown requested");
            signal_state.shutdown.trigger_shutdown();
            close_connections(&signal_state.connections);
        };

        state.shutdown.set_ready();
        info!("serving HTTP and realtime channel connections");

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(graceful)
            .await;

        finish_drain(&state).await;
        served?;
        Ok(())
    }
}

fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/register", post(register_handler))
        .route("/register/{name}", delete(unregister_handler))
        .route("/modules", get(list_modules_handler))
        .route("/rpc", post(rpc_handler))
        .route("/queue", post(enqueue_handler).get(list_queue_handler))
        .route("/", get(ws_upgrade_handler))
        .route("/ws", get(ws_upgrade_handler))
        .layer(request_timeout_layer(&state.config))
        // Added after the timeout layer so a long drain runs to completion.
        .route("/queue/process", post(process_queue_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            track_in_flight,
        ));

    let layers = build_http_layers(&state.config);

    Router::new()
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .merge(api)
        .layer(layers)
        .with_state(state)
}

/// Sends a Close frame to every open realtime channel.
fn close_connections(connections: &ConnectionRegistry) {
    let handles = connections.drain_all();
    if handles.is_empty() {
        return;
    }
    info!(count = handles.len(), "closing realtime channels");
    for handle in &handles {
        let _ = handle.try_send(OutboundMessage::Close(Some(
            "server shutting down".to_string(),
        )));
    }
}

/// Waits for in-flight calls, then stops the drain worker.
async fn finish_drain(state: &AppState) {
    state.shutdown.trigger_shutdown();
    close_connections(&state.connections);

    if state.shutdown.wait_for_drain(DRAIN_TIMEOUT).await {
        info!("all in-flight calls drained");
    } else {
        warn!(
            in_flight = state.shutdown.in_flight_count(),
            "drain timeout expired with calls still in flight"
        );
    }
    state.drainer.stop().await;
}
