//! Interop Server: module registry, RPC dispatch, priority queue and a
//! realtime channel for polyglot modules.

pub mod network;
pub mod service;
pub mod telemetry;

pub use network::{NetworkConfig, NetworkModule};
pub use service::{InteropError, InteropService, ServerConfig};
