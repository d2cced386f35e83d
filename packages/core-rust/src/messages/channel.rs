//! Realtime channel messages.
//!
//! Every frame is a JSON object discriminated by its `type` field.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorCode;
use crate::types::ModuleRecord;

/// Client-to-server frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Perform a dispatch and answer with `response` (or `error`) carrying
    /// the same `id`.
    Call {
        /// Opaque correlation id chosen by the client, echoed verbatim.
        id: Value,
        target: String,
        method: String,
        #[serde(default = "empty_params")]
        params: Value,
    },
    /// Acknowledged with `subscribed`; no events are forwarded.
    Subscribe { target: String },
}

impl ClientMessage {
    /// Parses one inbound text frame.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error for malformed JSON, a missing field, or
    /// an unknown `type`.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Server-to-client frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Snapshot of the registry, pushed once on connect.
    Modules { data: Vec<ModuleRecord> },
    Response {
        id: Value,
        result: Value,
        #[serde(skip_serializing_if = "std::ops::Not::not", default)]
        stub: bool,
    },
    Subscribed { target: String },
    Error {
        error: String,
        /// Correlation id of the failed `call`, if the failure belongs to one.
        #[serde(skip_serializing_if = "Option::is_none", default)]
        id: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        code: Option<ErrorCode>,
    },
}

impl ServerMessage {
    /// Serializes the frame for the socket.
    ///
    /// # Errors
    ///
    /// Returns an error only if a contained value cannot be represented as JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn empty_params() -> Value {
    Value::Object(serde_json::Map::new())
}
