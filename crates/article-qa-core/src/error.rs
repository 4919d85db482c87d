//! Error taxonomy for the retrieval pipeline.

use thiserror::Error;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, QaError>;

/// Errors surfaced by the pipeline and its collaborators.
///
/// Every variant aborts [`QueryPipeline::answer`](crate::pipeline::QueryPipeline::answer)
/// and is returned to the caller unchanged. Truncation during prompt
/// packing is not an error; see [`PackStatus`](crate::pack::PackStatus).
#[derive(Error, Debug)]
pub enum QaError {
    /// The corpus or query log could not be read or written.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The embedding call failed or returned malformed data.
    #[error("embedding provider error: {0}")]
    EmbeddingProvider(String),

    /// The completion call failed or returned no choices.
    #[error("completion provider error: {0}")]
    CompletionProvider(String),

    /// Embeddings in the corpus disagree on dimensionality.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimensionality already established by the corpus.
        expected: usize,
        /// Dimensionality of the offending vector.
        actual: usize,
    },
}

impl QaError {
    /// Short machine-readable name, used in logs and HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            QaError::StorageUnavailable(_) => "storage_unavailable",
            QaError::EmbeddingProvider(_) => "embedding_provider_error",
            QaError::CompletionProvider(_) => "completion_provider_error",
            QaError::DimensionMismatch { .. } => "dimension_mismatch",
        }
    }
}
