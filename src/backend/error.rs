//! Backend error types
//!
//! Every failure coming back from the backend-as-a-service ends up here.
//! The display strings are what users see, so provider messages are kept verbatim.

use thiserror::Error;

/// Errors that can occur when talking to the backend
#[derive(Error, Debug)]
pub enum BackendError {
    /// The provider answered with a non-success status
    #[error("{message}")]
    Api { status: u16, message: String },

    /// Transport-level failure
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Request exceeded the client timeout
    #[error("Request timeout")]
    Timeout,

    /// Backend could not be reached
    #[error("Backend unavailable")]
    Unavailable,

    /// A single-row operation matched nothing
    #[error("No rows returned")]
    NotFound,

    /// Row could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Blob storage rejected the object
    #[error("Storage error: {0}")]
    Storage(String),
}

impl BackendError {
    /// Build an API error from a status code and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        BackendError::Api {
            status,
            message: message.into(),
        }
    }

    /// Whether the provider reported a unique-constraint violation
    pub fn is_unique_violation(&self) -> bool {
        match self {
            BackendError::Api { status, message } => {
                *status == 409 || message.contains("duplicate key")
            }
            _ => false,
        }
    }

    /// Classify a reqwest error the same way for every call site
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else if err.is_connect() {
            BackendError::Unavailable
        } else {
            BackendError::Request(err)
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Serialization(err.to_string())
    }
}

/// Result type alias for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_message_is_verbatim() {
        let err = BackendError::api(400, "Invalid login credentials");
        assert_eq!(err.to_string(), "Invalid login credentials");
    }

    #[test]
    fn test_unique_violation_detection() {
        assert!(BackendError::api(409, "conflict").is_unique_violation());
        assert!(BackendError::api(
            400,
            "duplicate key value violates unique constraint \"friend_requests_pair\""
        )
        .is_unique_violation());
        assert!(!BackendError::api(400, "bad request").is_unique_violation());
        assert!(!BackendError::NotFound.is_unique_violation());
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: BackendError = json_err.into();
        assert!(matches!(err, BackendError::Serialization(_)));
    }
}
