//! Health, liveness, and readiness endpoint handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use interop_core::messages::HealthResponse;

use super::AppState;
use crate::network::HealthState;

/// Reports registered modules and queue depth.
///
/// Always returns 200; `state` tells a draining server apart from a ready one.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let service = &state.service;
    Json(HealthResponse {
        status: "ok".to_string(),
        state: state.shutdown.health_state().as_str().to_string(),
        timestamp: service.now(),
        modules: service.registry().names(),
        queue_size: service.queue().len(),
        connections: state.connections.count(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// Liveness probe. Always 200 while the process answers.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe. 200 only in the `Ready` state, 503 otherwise.
pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    if state.shutdown.health_state() == HealthState::Ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
