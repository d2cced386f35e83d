//! Wire message schemas for the interop protocol.
//!
//! All bodies are JSON. Structs use camelCase field names so that the
//! JavaScript and Python module clients read them without translation.

pub mod channel;
pub mod http;
pub mod rpc;

pub use channel::{ClientMessage, ServerMessage};

pub use http::{
    AckResponse, HealthResponse, ModuleListResponse, ProcessQueueRequest, ProcessQueueResponse,
    QueueListResponse, QueueSubmitRequest, QueueSubmitResponse, RegisterRequest, RpcRequest,
    RpcResponse,
};

pub use rpc::ModuleRpcRequest;
