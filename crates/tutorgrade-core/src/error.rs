//! Error types shared across the workspace.
//!
//! Provider errors are defined here so the scoring operation can downcast
//! and classify them for retry decisions without string matching.

use thiserror::Error;

use crate::model::ExamId;

/// Errors that can occur when talking to a grading backend.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested model was not found.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The backend answered without any text.
    #[error("backend returned an empty response")]
    EmptyResponse,
}

impl ProviderError {
    /// Returns `true` if this error is permanent and should not be retried.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ProviderError::AuthenticationFailed(_) | ProviderError::ModelNotFound(_)
        )
    }

    /// Returns the retry-after delay in milliseconds, if applicable.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            ProviderError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }
}

/// Failures of the question store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or a write did not persist.
    #[error("store unavailable during {operation}: {source}")]
    Unavailable {
        operation: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A referenced record does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// Persisted data could not be decoded.
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
}

impl StoreError {
    pub fn unavailable(
        operation: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        StoreError::Unavailable {
            operation,
            source: source.into(),
        }
    }
}

/// Errors that abort an exam flow.
///
/// Grading and report failures never appear here; they are absorbed into
/// fallback data.
#[derive(Debug, Error)]
pub enum ExamError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// No question exists for the requested subject.
    #[error("no questions available for subject '{subject}'")]
    NoQuestions { subject: String },

    #[error("exam {0} not found")]
    ExamNotFound(ExamId),
}
