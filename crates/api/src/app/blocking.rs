//! Bridge from async handlers to the synchronous services.

use mixbook_infra::{ServiceError, ServiceResult};

/// Run a service call on tokio's blocking pool.
///
/// Store access, credential hashing and the formula fan-out all block. A task
/// that panics or is cancelled surfaces as an internal fault.
pub async fn run<T, F>(op: F) -> ServiceResult<T>
where
    F: FnOnce() -> ServiceResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op).await.unwrap_or_else(|err| {
        tracing::error!(error = %err, "blocking service call did not complete");
        Err(ServiceError::Internal)
    })
}
