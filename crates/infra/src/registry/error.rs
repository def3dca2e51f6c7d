use thiserror::Error;
use tracing::error;

use mixbook_core::DomainError;

use crate::store::StoreError;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Outcome taxonomy of every service operation.
///
/// `Internal` carries no detail; the cause is logged where it happened.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("failed precondition: {0}")]
    Precondition(String),

    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("internal error")]
    Internal,
}

impl ServiceError {
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ServiceError::NotFound,
            StoreError::AlreadyExists => ServiceError::AlreadyExists,
            StoreError::Storage(_) => ServiceError::Internal,
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => ServiceError::Precondition(msg),
        }
    }
}

/// Map an authoritative-record failure, logging the cause of internal ones.
pub(crate) fn store_failure(op: &'static str, err: StoreError) -> ServiceError {
    if let StoreError::Storage(cause) = &err {
        error!(op, cause = %cause, "store operation failed");
    }
    err.into()
}
