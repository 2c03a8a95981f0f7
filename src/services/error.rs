//! Service errors

use thiserror::Error;

use crate::backend::BackendError;
use crate::persist::PersistError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("{0}")]
    Validation(String),

    #[error("A friend request already exists between these users")]
    DuplicateRequest,

    #[error("{0} not found")]
    NotFound(String),

    /// Backend failures keep the provider's message
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Local state error: {0}")]
    Persist(#[from] PersistError),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
