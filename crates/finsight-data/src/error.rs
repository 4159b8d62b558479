use finsight_core::FinsightError;
use thiserror::Error;

/// A query that failed on every attempt.
#[derive(Debug, Clone, Error)]
#[error("Failed after {attempts} attempts: {message}")]
pub struct FetchFailure {
    /// Attempts made before giving up.
    pub attempts: u32,
    /// Whether the last attempt failed by timing out.
    pub is_timeout: bool,
    /// Error of the last attempt.
    pub message: String,
}

/// Failure of a retrieval pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchFailure),

    /// The service answered with a shape none of the detectors recognise.
    #[error("Unsupported API response format: {0}")]
    UnsupportedShape(String),

    /// The result payload could not be fetched or read.
    #[error("{0}")]
    Payload(String),

    #[error(transparent)]
    Store(#[from] FinsightError),
}

impl PipelineError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, PipelineError::Fetch(failure) if failure.is_timeout)
    }
}

impl From<PipelineError> for FinsightError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Fetch(failure) => FinsightError::Fetch {
                is_timeout: failure.is_timeout,
                message: failure.to_string(),
            },
            PipelineError::Store(inner) => inner,
            other => FinsightError::Tool(other.to_string()),
        }
    }
}
