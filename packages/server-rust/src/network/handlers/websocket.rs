//! Realtime channel: WebSocket upgrade, read loop, and per-connection writer.
//!
//! Each socket gets a `ConnectionHandle` with a bounded outbound channel. A
//! writer task owns the sink half and forwards whatever lands on that
//! channel, so replies from concurrently running calls never race on the
//! socket. Every `call` runs in its own task; a slow module only delays the
//! reply to that one call. Once the server starts draining, the read loop
//! stops and the channel is closed.

use std::sync::Arc;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use interop_core::messages::{ClientMessage, ServerMessage};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::AppState;
use crate::network::{ConnectionHandle, OutboundMessage};
use crate::service::InteropError;

/// Upgrades an HTTP connection to a realtime channel.
pub async fn ws_upgrade_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let conn = &state.config.connection;
    ws.write_buffer_size(conn.ws_write_buffer_size)
        .max_write_buffer_size(conn.ws_max_write_buffer_size)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (handle, rx) = state.connections.register(&state.config.connection);
    let conn_id = handle.id;
    info!(connection = %conn_id, "realtime channel connected");

    let (sink, mut stream) = socket.split();
    let writer = tokio::spawn(write_loop(sink, rx));

    let snapshot = ServerMessage::Modules {
        data: state.service.modules(),
    };
    send(&state, &handle, &snapshot).await;

    let mut shutdown = state.shutdown.shutdown_receiver();
    loop {
        let frame = tokio::select! {
            frame = stream.next() => frame,
            _ = shutdown.wait_for(|draining| *draining) => {
                debug!(connection = %conn_id, "server draining; no longer reading");
                let _ = handle.try_send(OutboundMessage::Close(Some(
                    "server shutting down".to_string(),
                )));
                break;
            }
        };
        let Some(frame) = frame else {
            break;
        };
        match frame {
            Ok(Message::Text(text)) => handle_text(&state, &handle, text.as_str()).await,
            Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                Ok(text) => handle_text(&state, &handle, text).await,
                Err(_) => {
                    let err = InteropError::Parse("binary frame is not UTF-8".to_string());
                    send(&state, &handle, &error_message(&err, None)).await;
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                debug!(connection = %conn_id, error = %err, "realtime channel read failed");
                break;
            }
        }
    }

    state.connections.remove(conn_id);
    // The writer exits once the last handle clone, held by any still-running
    // call task, is dropped.
    drop(handle);
    if let Err(err) = writer.await {
        warn!(connection = %conn_id, error = %err, "realtime channel writer panicked");
    }
    info!(connection = %conn_id, "realtime channel closed");
}

async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<OutboundMessage>,
) {
    while let Some(msg) = rx.recv().await {
        match msg {
            OutboundMessage::Text(text) => {
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            OutboundMessage::Close(reason) => {
                let frame = CloseFrame {
                    code: close_code::AWAY,
                    reason: reason.unwrap_or_default().into(),
                };
                let _ = sink.send(Message::Close(Some(frame))).await;
                break;
            }
        }
    }
}

/// Handles one inbound frame.
///
/// `call` is spawned and answered asynchronously; `subscribe` and parse
/// failures are answered before the next frame is read.
pub(crate) async fn handle_text(state: &AppState, handle: &Arc<ConnectionHandle>, text: &str) {
    let message = match ClientMessage::parse(text) {
        Ok(message) => message,
        Err(err) => {
            debug!(connection = %handle.id, error = %err, "unparsable realtime message");
            let err = InteropError::Parse(err.to_string());
            send(state, handle, &error_message(&err, None)).await;
            return;
        }
    };

    match message {
        ClientMessage::Call {
            id,
            target,
            method,
            params,
        } => {
            let state = state.clone();
            let handle = Arc::clone(handle);
            tokio::spawn(async move {
                let _guard = state.shutdown.in_flight_guard();
                handle.metadata.write().await.calls += 1;
                let reply = match state.service.dispatch(&target, &method, params).await {
                    Ok(outcome) => ServerMessage::Response {
                        id,
                        stub: outcome.is_stub(),
                        result: outcome.result,
                    },
                    Err(err) => {
                        debug!(
                            connection = %handle.id,
                            module = %target,
                            method = %method,
                            error = %err,
                            "realtime call failed"
                        );
                        error_message(&err, Some(id))
                    }
                };
                send(&state, &handle, &reply).await;
            });
        }
        ClientMessage::Subscribe { target } => {
            handle
                .metadata
                .write()
                .await
                .subscriptions
                .insert(target.clone());
            debug!(connection = %handle.id, module = %target, "subscribed");
            send(state, handle, &ServerMessage::Subscribed { target }).await;
        }
    }
}

fn error_message(err: &InteropError, id: Option<Value>) -> ServerMessage {
    ServerMessage::Error {
        error: err.to_string(),
        id,
        code: Some(err.code()),
    }
}

async fn send(state: &AppState, handle: &ConnectionHandle, message: &ServerMessage) {
    let text = match message.to_json() {
        Ok(text) => text,
        Err(err) => {
            warn!(connection = %handle.id, error = %err, "failed to encode realtime message");
            return;
        }
    };
    if let Err(err) = handle
        .send_timeout(
            OutboundMessage::Text(text),
            state.config.connection.send_timeout,
        )
        .await
    {
        debug!(connection = %handle.id, error = ?err, "dropping realtime message");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::routing::post;
    use axum::{Json, Router};
    use interop_core::messages::RegisterRequest;
    use interop_core::ErrorCode;
    use serde_json::json;
    use tokio::sync::mpsc::error::TryRecvError;

    use super::*;
    use crate::network::handlers::test_support::{test_state, test_state_with};
    use crate::network::ConnectionConfig;
    use crate::service::ServerConfig;

    async fn next_message(rx: &mut mpsc::Receiver<OutboundMessage>) -> ServerMessage {
        match rx.recv().await.unwrap() {
            OutboundMessage::Text(text) => serde_json::from_str(&text).unwrap(),
            OutboundMessage::Close(_) => panic!("unexpected close"),
        }
    }

    fn register_stub(state: &AppState, name: &str) {
        state
            .service
            .register(RegisterRequest {
                name: Some(name.into()),
                language: Some("python".into()),
                ..RegisterRequest::default()
            })
            .unwrap();
    }

    /// State with a stub module `py-ml` and a module `go-slow` whose `/rpc`
    /// answers after `delay`.
    async fn state_with_slow_module(delay: Duration) -> AppState {
        let app = Router::new().route(
            "/rpc",
            post(move || async move {
                tokio::time::sleep(delay).await;
                Json(json!({"slow": true}))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let state = test_state_with(ServerConfig {
            module_host: "127.0.0.1".to_string(),
            dispatch_timeout_ms: 5_000,
            ..ServerConfig::default()
        });
        register_stub(&state, "py-ml");
        state
            .service
            .register(RegisterRequest {
                name: Some("go-slow".into()),
                language: Some("go".into()),
                port: Some(port),
                ..RegisterRequest::default()
            })
            .unwrap();
        state
    }

    fn response_id(message: &ServerMessage) -> Option<&Value> {
        match message {
            ServerMessage::Response { id, .. } => Some(id),
            _ => None,
        }
    }

    #[tokio::test]
    async fn slow_call_does_not_hold_up_later_frames() {
        let state = state_with_slow_module(Duration::from_secs(1)).await;
        let (handle, mut rx) = state.connections.register(&ConnectionConfig::default());

        handle_text(
            &state,
            &handle,
            r#"{"type":"call","id":"slow","target":"go-slow","method":"m"}"#,
        )
        .await;
        handle_text(
            &state,
            &handle,
            r#"{"type":"call","id":"fast","target":"py-ml","method":"m"}"#,
        )
        .await;
        handle_text(&state, &handle, r#"{"type":"subscribe","target":"py-ml"}"#).await;

        let mut early = Vec::new();
        for _ in 0..2 {
            let message = tokio::time::timeout(Duration::from_millis(500), next_message(&mut rx))
                .await
                .expect("reply held up behind the slow call");
            early.push(message);
        }
        assert!(early
            .iter()
            .any(|m| response_id(m) == Some(&json!("fast"))));
        assert!(early.contains(&ServerMessage::Subscribed {
            target: "py-ml".into()
        }));

        match next_message(&mut rx).await {
            ServerMessage::Response { id, result, stub } => {
                assert_eq!(id, json!("slow"));
                assert!(!stub);
                assert_eq!(result, json!({"slow": true}));
            }
            other => panic!("expected slow response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_call_on_one_connection_does_not_delay_another() {
        let state = state_with_slow_module(Duration::from_secs(1)).await;
        let (slow_handle, mut slow_rx) = state.connections.register(&ConnectionConfig::default());
        let (fast_handle, mut fast_rx) = state.connections.register(&ConnectionConfig::default());

        handle_text(
            &state,
            &slow_handle,
            r#"{"type":"call","id":1,"target":"go-slow","method":"m"}"#,
        )
        .await;
        handle_text(
            &state,
            &fast_handle,
            r#"{"type":"call","id":2,"target":"py-ml","method":"m"}"#,
        )
        .await;

        let fast = tokio::time::timeout(Duration::from_millis(500), next_message(&mut fast_rx))
            .await
            .expect("reply held up by another connection");
        assert_eq!(response_id(&fast), Some(&json!(2)));
        assert!(matches!(slow_rx.try_recv(), Err(TryRecvError::Empty)));

        let slow = next_message(&mut slow_rx).await;
        assert_eq!(response_id(&slow), Some(&json!(1)));
    }

    #[tokio::test]
    async fn call_replies_with_same_id() {
        let state = test_state();
        register_stub(&state, "py-ml");
        let (handle, mut rx) = state.connections.register(&ConnectionConfig::default());

        let frame = json!({
            "type": "call",
            "id": "ws_1700000000000_ab12",
            "target": "py-ml",
            "method": "predict",
            "params": {"x": 2}
        });
        handle_text(&state, &handle, &frame.to_string()).await;

        match next_message(&mut rx).await {
            ServerMessage::Response { id, result, stub } => {
                assert_eq!(id, json!("ws_1700000000000_ab12"));
                assert!(stub);
                assert_eq!(result["params"], json!({"x": 2}));
            }
            other => panic!("expected response, got {other:?}"),
        }
        assert_eq!(handle.metadata.read().await.calls, 1);
    }

    #[tokio::test]
    async fn call_to_unknown_module_returns_error_with_id() {
        let state = test_state();
        let (handle, mut rx) = state.connections.register(&ConnectionConfig::default());

        let frame = json!({"type": "call", "id": 7, "target": "ghost", "method": "m"});
        handle_text(&state, &handle, &frame.to_string()).await;

        match next_message(&mut rx).await {
            ServerMessage::Error { error, id, code } => {
                assert_eq!(error, "target module 'ghost' not found");
                assert_eq!(id, Some(json!(7)));
                assert_eq!(code, Some(ErrorCode::ModuleNotFound));
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn subscribe_is_acknowledged_and_recorded() {
        let state = test_state();
        let (handle, mut rx) = state.connections.register(&ConnectionConfig::default());

        handle_text(&state, &handle, r#"{"type":"subscribe","target":"go-db"}"#).await;

        assert_eq!(
            next_message(&mut rx).await,
            ServerMessage::Subscribed {
                target: "go-db".into()
            }
        );
        assert!(handle.metadata.read().await.subscriptions.contains("go-db"));
    }

    #[tokio::test]
    async fn unknown_type_and_garbage_are_parse_errors() {
        let state = test_state();
        let (handle, mut rx) = state.connections.register(&ConnectionConfig::default());

        for frame in [r#"{"type":"publish","topic":"x"}"#, "not json at all"] {
            handle_text(&state, &handle, frame).await;
            match next_message(&mut rx).await {
                ServerMessage::Error { error, id, code } => {
                    assert!(error.starts_with("invalid message"), "{error}");
                    assert_eq!(id, None);
                    assert_eq!(code, Some(ErrorCode::ParseError));
                }
                other => panic!("expected error, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn call_holds_in_flight_guard_until_replied() {
        let state = test_state();
        register_stub(&state, "py-ml");
        let (handle, mut rx) = state.connections.register(&ConnectionConfig::default());

        handle_text(
            &state,
            &handle,
            r#"{"type":"call","id":"a","target":"py-ml","method":"m"}"#,
        )
        .await;
        next_message(&mut rx).await;

        assert!(state
            .shutdown
            .wait_for_drain(std::time::Duration::from_secs(1))
            .await);
    }
}
