use async_trait::async_trait;

use crate::types::{EmbeddingVector, WorkItem};

/// Inventory of objects that still lack an embedding.
#[async_trait]
pub trait WorkSource: Send + Sync {
    /// Returns up to `count` items without an embedding, ordered by ascending
    /// id and skipping the first `offset` of them. An empty result means
    /// there is nothing to do.
    async fn list_unembedded(&self, count: usize, offset: usize) -> anyhow::Result<Vec<WorkItem>>;
}

/// Fetches and decodes the payload behind a source URL.
#[async_trait]
pub trait Downloader: Send + Sync {
    type Output: Send + 'static;

    async fn fetch(&self, url: &str) -> anyhow::Result<Self::Output>;
}

/// A batch embedding function.
///
/// `embed_batch` must return exactly one vector of length `dim()` per input,
/// in input order.
pub trait Embedder<T>: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_batch(&self, inputs: &[T]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Bulk sink for embeddings.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Writes one batch. Implementations reject an empty batch with
    /// [`crate::error::PipelineError::EmptyBatch`].
    async fn bulk_write(&self, batch: &[EmbeddingVector]) -> anyhow::Result<()>;
}
