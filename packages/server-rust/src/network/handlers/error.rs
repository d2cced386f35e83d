//! Conversion of service errors into HTTP responses, and request body decoding.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use interop_core::ErrorBody;
use serde::de::DeserializeOwned;

use crate::service::InteropError;

impl InteropError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::Parse(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } | Self::ModuleNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Dispatch { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for InteropError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(ErrorBody::new(self.code(), self.to_string()))).into_response()
    }
}

/// Decodes a JSON request body. An empty body decodes as `T::default()`, so
/// missing required fields surface as `InvalidRequest` from validation.
///
/// `PARSE_ERROR` belongs to the realtime channel; over HTTP a body that is
/// not valid JSON, or has a field of the wrong type, is an invalid request.
///
/// # Errors
///
/// Returns `InteropError::InvalidRequest` for a body that does not decode as `T`.
pub fn decode_body<T>(body: &Bytes) -> Result<T, InteropError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|err| InteropError::InvalidRequest(format!("invalid request body: {err}")))
}
