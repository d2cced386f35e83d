//! Register, unregister and list handlers.

use axum::extract::{Path, State};
use axum::Json;
use bytes::Bytes;
use interop_core::messages::{AckResponse, ModuleListResponse, RegisterRequest};

use super::error::decode_body;
use super::AppState;
use crate::service::InteropError;

/// `POST /register`
pub async fn register_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AckResponse>, InteropError> {
    let request: RegisterRequest = decode_body(&body)?;
    let record = state.service.register(request)?;
    Ok(Json(AckResponse::ok(format!(
        "Module {} registered",
        record.name
    ))))
}

/// `DELETE /register/{name}`
pub async fn unregister_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<AckResponse>, InteropError> {
    let record = state.service.unregister(&name)?;
    Ok(Json(AckResponse::ok(format!(
        "Module {} unregistered",
        record.name
    ))))
}

/// `GET /modules`
pub async fn list_modules_handler(State(state): State<AppState>) -> Json<ModuleListResponse> {
    let modules = state.service.modules();
    Json(ModuleListResponse {
        total: modules.len(),
        modules,
    })
}
