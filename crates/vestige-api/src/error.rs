//! API error type and HTTP status mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use vestige_core::Error;

/// API-level error with an HTTP status mapping.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request
    BadRequest(String),
    /// 401 Unauthorized
    Unauthorized(String),
    /// 403 Forbidden
    Forbidden(String),
    /// 404 Not Found
    NotFound(String),
    /// 409 Conflict
    Conflict(String),
    /// 500 Internal Server Error
    Internal(String),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::ArtifactNotFound(id) => ApiError::NotFound(format!("artifact {}", id)),
            Error::SessionNotFound(id) => ApiError::NotFound(format!("session {}", id)),
            // Ended and expired sessions are known but unusable.
            Error::SessionEnded(id) => ApiError::Forbidden(format!("session {} has ended", id)),
            Error::SessionExpired(id) => ApiError::Forbidden(format!("session {} has expired", id)),
            Error::Unauthorized(msg) => ApiError::Unauthorized(msg),
            Error::Forbidden(msg) => ApiError::Forbidden(msg),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::Database(ref db_err) => {
                if let sqlx::Error::Database(inner) = db_err {
                    if inner.is_unique_violation() {
                        return ApiError::Conflict("resource already exists".to_string());
                    }
                }
                error!(error_msg = %e, "Database error");
                ApiError::Internal("database error".to_string())
            }
            other => {
                error!(error_msg = %other, "Internal error");
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
