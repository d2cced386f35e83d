//! Request and response bodies for the synchronous HTTP surface.
//!
//! Request structs keep their required fields optional so the server can
//! answer a missing field with an `INVALID_REQUEST` body instead of a
//! deserializer rejection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{ModuleRecord, QueueItem};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Body of `POST /register`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    /// Defaults to `["rpc"]` when absent.
    #[serde(default)]
    pub endpoints: Option<Vec<String>>,
    #[serde(default)]
    pub port: Option<u16>,
}

/// Body of `POST /rpc`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcRequest {
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    /// Defaults to `{}` when absent.
    #[serde(default)]
    pub params: Option<Value>,
}

/// Body of `POST /queue`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSubmitRequest {
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
    /// Defaults to `0` when absent.
    #[serde(default)]
    pub priority: Option<i64>,
}

/// Body of `POST /queue/process`. The whole body may be omitted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessQueueRequest {
    #[serde(default)]
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"ok"` while the process answers.
    pub status: String,
    /// Lifecycle state: `starting`, `ready`, `draining` or `stopped`.
    pub state: String,
    pub timestamp: DateTime<Utc>,
    /// Registered module names in listing order.
    pub modules: Vec<String>,
    pub queue_size: usize,
    /// Open realtime channel connections.
    pub connections: usize,
    pub uptime_secs: u64,
}

/// Acknowledgement returned by register and unregister.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckResponse {
    pub success: bool,
    pub message: String,
}

impl AckResponse {
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// `GET /modules`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleListResponse {
    pub modules: Vec<ModuleRecord>,
    pub total: usize,
}

/// Successful `POST /rpc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcResponse {
    pub success: bool,
    pub result: Value,
    pub timestamp: DateTime<Utc>,
    /// Set when the result was synthesized because the target has no port.
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub stub: bool,
}

/// Successful `POST /queue`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSubmitResponse {
    pub success: bool,
    pub message_id: String,
    pub queue_size: usize,
}

/// `GET /queue`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueListResponse {
    pub queue: Vec<QueueItem>,
    pub size: usize,
}

/// `POST /queue/process`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessQueueResponse {
    pub processed: usize,
    pub remaining: usize,
    pub results: Vec<QueueItem>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn register_request_tolerates_missing_fields() {
        let req: RegisterRequest = serde_json::from_value(json!({"name": "go-db"})).unwrap();
        assert_eq!(req.name.as_deref(), Some("go-db"));
        assert!(req.language.is_none());
        assert!(req.endpoints.is_none());
        assert!(req.port.is_none());
    }

    #[test]
    fn register_request_accepts_null_port() {
        let req: RegisterRequest = serde_json::from_value(json!({
            "name": "py", "language": "python", "endpoints": ["rpc"], "port": null
        }))
        .unwrap();
        assert!(req.port.is_none());
        assert_eq!(req.endpoints, Some(vec!["rpc".to_string()]));
    }

    #[test]
    fn queue_submit_request_reads_priority() {
        let req: QueueSubmitRequest = serde_json::from_value(json!({
            "target": "go-db", "method": "saveData", "priority": 5
        }))
        .unwrap();
        assert_eq!(req.priority, Some(5));
        assert!(req.params.is_none());
    }

    #[test]
    fn rpc_response_omits_stub_flag_for_real_calls() {
        let resp = RpcResponse {
            success: true,
            result: json!({"rows": 1}),
            timestamp: DateTime::from_timestamp(0, 0).unwrap(),
            stub: false,
        };
        let value = serde_json::to_value(&resp).unwrap();
        assert!(value.get("stub").is_none());

        let stubbed = RpcResponse { stub: true, ..resp };
        let value = serde_json::to_value(&stubbed).unwrap();
        assert_eq!(value["stub"], true);
    }

    #[test]
    fn submit_response_uses_camel_case() {
        let resp = QueueSubmitResponse {
            success: true,
            message_id: "msg_1_00000000".to_string(),
            queue_size: 1,
        };
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["messageId"], "msg_1_00000000");
        assert_eq!(value["queueSize"], 1);
    }
}
