//! Message queue handlers.

use axum::extract::State;
use axum::Json;
use bytes::Bytes;
use interop_core::messages::{
    ProcessQueueRequest, ProcessQueueResponse, QueueListResponse, QueueSubmitRequest,
    QueueSubmitResponse,
};

use super::error::decode_body;
use super::AppState;
use crate::service::InteropError;

/// `POST /queue`
pub async fn enqueue_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<QueueSubmitResponse>, InteropError> {
    let request: QueueSubmitRequest = decode_body(&body)?;
    let message_id = state.service.send(request)?;
    Ok(Json(QueueSubmitResponse {
        success: true,
        message_id,
        queue_size: state.service.queue().len(),
    }))
}

/// `GET /queue`
pub async fn list_queue_handler(State(state): State<AppState>) -> Json<QueueListResponse> {
    let queue = state.service.queue_snapshot();
    Json(QueueListResponse {
        size: queue.len(),
        queue,
    })
}

/// `POST /queue/process`: drains through the worker so concurrent requests
/// run one after another.
pub async fn process_queue_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ProcessQueueResponse>, InteropError> {
    let request: ProcessQueueRequest = decode_body(&body)?;
    let limit = request
        .limit
        .unwrap_or(state.service.config().default_drain_limit);
    let results = state.drainer.drain(limit).await?;
    Ok(Json(ProcessQueueResponse {
        processed: results.len(),
        remaining: state.service.queue().len(),
        results,
    }))
}
