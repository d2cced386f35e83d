//! Synchronous call handler.

use axum::extract::State;
use axum::Json;
use bytes::Bytes;
use interop_core::messages::{RpcRequest, RpcResponse};
use tracing::debug;

use super::error::decode_body;
use super::AppState;
use crate::service::InteropError;

/// `POST /rpc`: dispatch and wait for the module's answer.
///
/// Stub results carry `stub: true` so callers can tell them from real ones.
pub async fn rpc_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<RpcResponse>, InteropError> {
    let request: RpcRequest = decode_body(&body)?;
    debug!(module = ?request.target, method = ?request.method, "rpc call");
    let outcome = state.service.call(request).await?;
    Ok(Json(RpcResponse {
        success: true,
        stub: outcome.is_stub(),
        result: outcome.result,
        timestamp: state.service.now(),
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use interop_core::messages::RegisterRequest;
    use serde_json::json;

    use super::*;
    use crate::network::handlers::test_support::test_state;

    fn body(value: &serde_json::Value) -> Bytes {
        Bytes::from(value.to_string())
    }

    #[tokio::test]
    async fn stub_result_is_flagged() {
        let state = test_state();
        state
            .service
            .register(RegisterRequest {
                name: Some("py-ml".into()),
                language: Some("python".into()),
                ..RegisterRequest::default()
            })
            .unwrap();

        let Json(response) = rpc_handler(
            State(state),
            body(&json!({"target": "py-ml", "method": "predict", "params": {"x": 1}})),
        )
        .await
        .unwrap();

        assert!(response.success);
        assert!(response.stub);
        assert_eq!(response.result["method"], "predict");
        assert_eq!(response.result["params"], json!({"x": 1}));
    }

    #[tokio::test]
    async fn unknown_target_is_404() {
        let state = test_state();
        let err = rpc_handler(State(state), body(&json!({"target": "ghost", "method": "m"})))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_method_is_400() {
        let state = test_state();
        let err = rpc_handler(State(state), body(&json!({"target": "ghost"})))
            .await
            .unwrap_err();
        assert_eq!(err, InteropError::InvalidRequest("method is required".into()));
    }

    #[tokio::test]
    async fn unreachable_port_is_500_not_stub() {
        let state = test_state();
        // Bind and drop a listener to find a port nothing listens on.
        let port = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        state
            .service
            .register(RegisterRequest {
                name: Some("go-db".into()),
                language: Some("go".into()),
                port: Some(port),
                ..RegisterRequest::default()
            })
            .unwrap();

        let err = rpc_handler(
            State(state),
            body(&json!({"target": "go-db", "method": "saveData", "params": {"table": "users"}})),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, InteropError::Dispatch { .. }));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
