//! Error taxonomy shared by the HTTP API, the realtime channel and queue draining.

use interop_core::ErrorCode;

/// Errors produced by registry, dispatch, queue, and channel operations.
///
/// Every variant is turned into a structured response at the boundary where
/// it surfaces; none of them terminate the server.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InteropError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("module '{name}' is not registered")]
    NotFound { name: String },
    #[error("target module '{target}' not found")]
    ModuleNotFound { target: String },
    #[error("call to '{target}' failed: {message}")]
    Dispatch { target: String, message: String },
    #[error("invalid message: {0}")]
    Parse(String),
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl InteropError {
    /// Builds an `InvalidRequest` naming the missing fields.
    #[must_use]
    pub fn missing_fields(fields: &[&str]) -> Self {
        let verb = if fields.len() == 1 { "is" } else { "are" };
        Self::InvalidRequest(format!("{} {verb} required", fields.join(" and ")))
    }

    /// Returns the stable wire code for this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidRequest(_) => ErrorCode::InvalidRequest,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::ModuleNotFound { .. } => ErrorCode::ModuleNotFound,
            Self::Dispatch { .. } => ErrorCode::DispatchError,
            Self::Parse(_) => ErrorCode::ParseError,
            Self::Unavailable(_) => ErrorCode::Unavailable,
        }
    }
}
