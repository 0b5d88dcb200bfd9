use thiserror::Error;

use crate::types::ObjectId;

/// Unrecoverable pipeline failures.
///
/// Item-level download or decode failures never show up here: they are
/// logged and counted by the fetch stage.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Work source failed: {0}")]
    Source(String),

    #[error("Fetch stage failed: {0}")]
    Fetch(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Embedder returned {got} vectors for a batch of {expected}")]
    EmbeddingLength { expected: usize, got: usize },

    #[error("Embedding for object {id} has dimension {got}, expected {expected}")]
    EmbeddingDimension { id: ObjectId, expected: usize, got: usize },

    #[error("Refusing to write an empty batch of embeddings")]
    EmptyBatch,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Pipeline task failed: {0}")]
    Task(String),

    #[error("Pipeline run was cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Wrap a collaborator error, keeping it intact when it already is a
    /// `PipelineError` (e.g. a store rejecting an empty batch).
    pub fn from_anyhow(err: anyhow::Error, wrap: impl FnOnce(String) -> Self) -> Self {
        match err.downcast::<PipelineError>() {
            Ok(inner) => inner,
            Err(other) => wrap(format!("{other:#}")),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_anyhow_keeps_typed_errors() {
        let err = anyhow::Error::new(PipelineError::EmptyBatch);
        assert_eq!(PipelineError::from_anyhow(err, PipelineError::Storage), PipelineError::EmptyBatch);
    }

    #[test]
    fn from_anyhow_wraps_foreign_errors() {
        let err = anyhow::anyhow!("connection reset");
        assert_eq!(
            PipelineError::from_anyhow(err, PipelineError::Storage),
            PipelineError::Storage("connection reset".to_string())
        );
    }
}
