use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use conductor_core::ConductorError;
use serde_json::json;

/// Wraps any domain error at the HTTP boundary, translating `.code()` /
/// `.http_status()` (§7 AMBIENT STACK) into the JSON error body every route
/// returns on failure.
pub struct ApiError(pub ConductorError);

impl From<ConductorError> for ApiError {
    fn from(e: ConductorError) -> Self {
        Self(e)
    }
}

impl From<conductor_entities::EntitiesError> for ApiError {
    fn from(e: conductor_entities::EntitiesError) -> Self {
        Self(e.into())
    }
}

impl From<conductor_memory::MemoryError> for ApiError {
    fn from(e: conductor_memory::MemoryError) -> Self {
        Self(e.into())
    }
}

impl From<conductor_workflow::WorkflowError> for ApiError {
    fn from(e: conductor_workflow::WorkflowError) -> Self {
        Self(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(json!({
            "error": {
                "code": self.0.code(),
                "message": self.0.to_string(),
            }
        }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
