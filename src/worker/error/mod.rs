use tokio::task::JoinError;

/// Failures of the worker plumbing itself, as opposed to job failures.
///
/// A job that fails to compress still finishes normally and carries its
/// error in its report.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Worker panicked: {0}")]
    Panicked(String),

    #[error("Worker was aborted before finishing")]
    Aborted,
}

pub type WorkerResult<T> = Result<T, WorkerError>;

impl From<JoinError> for WorkerError {
    fn from(err: JoinError) -> Self {
        if !err.is_panic() {
            return WorkerError::Aborted;
        }
        let panic = err.into_panic();
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        WorkerError::Panicked(message)
    }
}
