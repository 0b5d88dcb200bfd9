//! In-process inventory and vector store.
//!
//! Mirrors the upsert semantics of [`crate::LanceStore`] and additionally keeps
//! a log of every accepted write, so tests can assert on batching.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use artvec_core::error::PipelineError;
use artvec_core::traits::{VectorStore, WorkSource};
use artvec_core::types::{ArtObject, EmbeddingVector, ObjectId, WorkItem};

#[derive(Default)]
struct State {
    objects: BTreeMap<ObjectId, ArtObject>,
    embeddings: BTreeMap<ObjectId, Vec<f32>>,
    writes: Vec<Vec<ObjectId>>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn with_objects(objects: impl IntoIterator<Item = ArtObject>) -> Self {
        let objects = objects.into_iter().map(|o| (o.id, o)).collect();
        Self { state: Mutex::new(State { objects, ..State::default() }) }
    }

    /// Seeds bare objects that carry only an id and an image URL.
    pub fn with_work_items(items: impl IntoIterator<Item = WorkItem>) -> Self {
        Self::with_objects(items.into_iter().map(|w| ArtObject {
            id: w.id,
            original_id: w.id.to_string(),
            image_url: w.source_url,
            long_title: String::new(),
            artist: String::new(),
        }))
    }

    pub async fn insert_objects(&self, objects: impl IntoIterator<Item = ArtObject>) {
        let mut state = self.state.lock().await;
        for o in objects { state.objects.insert(o.id, o); }
    }

    pub async fn embedding(&self, id: ObjectId) -> Option<Vec<f32>> {
        self.state.lock().await.embeddings.get(&id).cloned()
    }

    /// Ids with a stored embedding, ascending.
    pub async fn embedded_ids(&self) -> Vec<ObjectId> {
        self.state.lock().await.embeddings.keys().copied().collect()
    }

    pub async fn count_embeddings(&self) -> usize {
        self.state.lock().await.embeddings.len()
    }

    /// The ids of every accepted `bulk_write`, in call order.
    pub async fn write_log(&self) -> Vec<Vec<ObjectId>> {
        self.state.lock().await.writes.clone()
    }
}

#[async_trait]
impl WorkSource for MemoryStore {
    async fn list_unembedded(&self, count: usize, offset: usize) -> Result<Vec<WorkItem>> {
        let state = self.state.lock().await;
        Ok(state
            .objects
            .values()
            .filter(|o| !state.embeddings.contains_key(&o.id))
            .skip(offset)
            .take(count)
            .map(ArtObject::work_item)
            .collect())
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn bulk_write(&self, batch: &[EmbeddingVector]) -> Result<()> {
        if batch.is_empty() { return Err(PipelineError::EmptyBatch.into()); }
        let mut state = self.state.lock().await;
        for e in batch { state.embeddings.insert(e.id, e.vector.clone()); }
        state.writes.push(batch.iter().map(|e| e.id).collect());
        Ok(())
    }
}
