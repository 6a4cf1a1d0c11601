// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::engine::EngineError;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request (validation, point budget, incomplete answers)
    BadRequest(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (used key, invitee already invited, concurrent activation)
    Conflict(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        let message = err.to_string();
        match err {
            EngineError::MissingIdentity
            | EngineError::Validation(_)
            | EngineError::PointBudget { .. }
            | EngineError::IncompleteAnswers { .. } => AppError::BadRequest(message),
            EngineError::AlreadyUsed | EngineError::AlreadyInvited | EngineError::Conflict(_) => {
                AppError::Conflict(message)
            }
            EngineError::NotFound(_) => AppError::NotFound(message),
            EngineError::Persistence(_) => AppError::InternalServerError(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_errors_map_to_status() {
        let status = |e: EngineError| AppError::from(e).into_response().status();

        assert_eq!(status(EngineError::PointBudget { total: 90.0 }), StatusCode::BAD_REQUEST);
        assert_eq!(status(EngineError::MissingIdentity), StatusCode::BAD_REQUEST);
        assert_eq!(status(EngineError::AlreadyUsed), StatusCode::CONFLICT);
        assert_eq!(status(EngineError::AlreadyInvited), StatusCode::CONFLICT);
        assert_eq!(
            status(EngineError::NotFound("survey".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(EngineError::Persistence(crate::store::StoreError::Backend(
                "down".to_string()
            ))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
