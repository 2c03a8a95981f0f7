//! API Error Types
//!
//! Defines error types for the API layer and implements conversion
//! to HTTP responses with appropriate status codes.
//!
//! Messages from the backend reach the client unchanged.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::backend::BackendError;
use crate::optimistic::TransitionError;
use crate::persist::PersistError;
use crate::services::ServiceError;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request validation failed
    #[error("{0}")]
    Validation(String),

    /// No signed-in session
    #[error("{0}")]
    Unauthorized(String),

    /// Resource not found
    #[error("{0}")]
    NotFound(String),

    /// Request conflicts with existing state
    #[error("{0}")]
    Conflict(String),

    /// Backend answered with an error
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    pub request_id: String,
}

/// Error details
#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotAuthenticated => ApiError::Unauthorized(err.to_string()),
            ServiceError::Validation(message) => ApiError::Validation(message),
            ServiceError::DuplicateRequest => ApiError::Conflict(err.to_string()),
            ServiceError::NotFound(_) => ApiError::NotFound(err.to_string()),
            ServiceError::Backend(e) => ApiError::Backend(e),
            ServiceError::Persist(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<TransitionError> for ApiError {
    fn from(err: TransitionError) -> Self {
        ApiError::Conflict(err.to_string())
    }
}

impl From<PersistError> for ApiError {
    fn from(err: PersistError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "NOT_AUTHENTICATED"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Backend(e) => match e {
                // client errors reported by the backend keep their status
                BackendError::Api { status, .. } if (400..500).contains(status) => (
                    StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_REQUEST),
                    "BACKEND_REJECTED",
                ),
                BackendError::Api { .. } => (StatusCode::BAD_GATEWAY, "BACKEND_ERROR"),
                BackendError::Timeout => (StatusCode::GATEWAY_TIMEOUT, "BACKEND_TIMEOUT"),
                BackendError::Unavailable | BackendError::Request(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "BACKEND_UNAVAILABLE")
                }
                BackendError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                BackendError::Storage(_) => (StatusCode::BAD_GATEWAY, "STORAGE_ERROR"),
                BackendError::Serialization(_) => {
                    (StatusCode::BAD_GATEWAY, "BACKEND_RESPONSE_INVALID")
                }
            },
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let request_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(
                request_id = %request_id,
                error_code = %code,
                error_message = %self,
                "API error occurred"
            );
        } else {
            tracing::warn!(
                request_id = %request_id,
                error_code = %code,
                error_message = %self,
                "Request rejected"
            );
        }

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: self.to_string(),
            },
            request_id,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_errors_map_to_status() {
        let cases = [
            (ServiceError::NotAuthenticated, StatusCode::UNAUTHORIZED),
            (ServiceError::validation("bad"), StatusCode::BAD_REQUEST),
            (ServiceError::DuplicateRequest, StatusCode::CONFLICT),
            (ServiceError::NotFound("Goal".into()), StatusCode::NOT_FOUND),
            (
                ServiceError::Backend(BackendError::api(400, "Invalid login credentials")),
                StatusCode::BAD_REQUEST,
            ),
            (
                ServiceError::Backend(BackendError::api(503, "upstream down")),
                StatusCode::BAD_GATEWAY,
            ),
            (ServiceError::Backend(BackendError::Timeout), StatusCode::GATEWAY_TIMEOUT),
        ];

        for (err, expected) in cases {
            let api: ApiError = err.into();
            assert_eq!(api.status_and_code().0, expected, "{}", api);
        }
    }

    #[test]
    fn test_backend_message_is_verbatim() {
        let api: ApiError = ServiceError::Backend(BackendError::api(400, "Invalid login credentials")).into();
        assert_eq!(api.to_string(), "Invalid login credentials");
    }

    #[test]
    fn test_transition_error_is_conflict() {
        let api: ApiError = crate::optimistic::RequestState::Pending
            .begin()
            .unwrap_err()
            .into();
        assert_eq!(api.status_and_code().0, StatusCode::CONFLICT);
    }
}
