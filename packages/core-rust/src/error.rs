//! Error taxonomy shared by the HTTP surface and the realtime channel.

use serde::{Deserialize, Serialize};

/// Stable, machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// A required request field was missing or malformed.
    InvalidRequest,
    /// Unregister of a module that is not registered.
    NotFound,
    /// Dispatch target is not registered.
    ModuleNotFound,
    /// Transport failure, timeout, or non-2xx reply from the target module.
    DispatchError,
    /// Malformed realtime channel message or unknown message type.
    ParseError,
    /// The server cannot take the request right now (e.g. shutting down).
    Unavailable,
}

impl ErrorCode {
    /// Returns the wire representation of this code.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::NotFound => "NOT_FOUND",
            Self::ModuleNotFound => "MODULE_NOT_FOUND",
            Self::DispatchError => "DISPATCH_ERROR",
            Self::ParseError => "PARSE_ERROR",
            Self::Unavailable => "UNAVAILABLE",
        }
    }
}

/// Error object nested in every failed HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub message: String,
}

/// Body of every failed HTTP response: `{success:false, error:{code, message}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: ErrorDetail,
}

impl ErrorBody {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ErrorDetail {
                code,
                message: message.into(),
            },
        }
    }
}
