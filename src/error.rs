use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use uuid::Uuid;

use crate::intake::IntakeError;
use crate::models::AssetSlot;
use crate::wizard::WizardError;

/// Errors returned by the HTTP handlers, rendered as `{ "error", "code" }`.
///
/// Failed generations are not errors at this level: they come back as a normal
/// session view whose wizard carries the inline message.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Session {0} not found")]
    SessionNotFound(Uuid),

    #[error(transparent)]
    Wizard(#[from] WizardError),

    #[error(transparent)]
    Intake(#[from] IntakeError),

    #[error("No generated design yet")]
    NoResult,

    #[error("No {0} image uploaded")]
    NoUpload(AssetSlot),

    #[error("A newer file was selected for this slot")]
    StaleSelection,

    #[error("Generation was cancelled")]
    Cancelled,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::SessionNotFound(_) | ApiError::NoResult | ApiError::NoUpload(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Wizard(WizardError::InvalidSubType(_)) => (StatusCode::BAD_REQUEST, "INVALID_SUB_TYPE"),
            ApiError::Wizard(WizardError::GuardRefused) => (StatusCode::CONFLICT, "GUARD_REFUSED"),
            ApiError::Wizard(WizardError::GenerationInFlight) => (StatusCode::CONFLICT, "GENERATION_IN_FLIGHT"),
            ApiError::Wizard(_) => (StatusCode::CONFLICT, "INVALID_TRANSITION"),
            ApiError::Intake(IntakeError::InvalidFileType(_)) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, "INVALID_FILE_TYPE"),
            ApiError::Intake(_) => (StatusCode::BAD_REQUEST, "INVALID_FILE"),
            ApiError::StaleSelection => (StatusCode::CONFLICT, "STALE_SELECTION"),
            ApiError::Cancelled => (StatusCode::CONFLICT, "CANCELLED"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                let body = json!({ "error": "An internal error occurred", "code": "INTERNAL_ERROR" });
                return (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response();
            }
        };

        let body = json!({
            "error": self.to_string(),
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
