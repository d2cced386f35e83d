//! Envelope posted to a module's own `/rpc` endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request body every registered module must accept on `POST /rpc`.
///
/// The module answers with any JSON body, which becomes the call's `result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleRpcRequest {
    pub method: String,
    pub params: Value,
}
