//! Domain types shared by the pipeline, the stores and the CLI.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Identity of an art object. Matches the primary key of the inventory.
pub type ObjectId = i64;

/// A bounded, ordered group of items handed across a stage boundary.
pub type Batch<T> = Vec<T>;

/// A catalogue record as it is stored in the inventory.
///
/// - `id`: stable numeric identity, used as the key for embeddings
/// - `original_id`: the identifier used by the upstream catalogue
/// - `image_url`: where the image is downloaded from
/// - `long_title`/`artist`: display metadata returned with search hits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtObject {
    pub id: ObjectId,
    pub original_id: String,
    pub image_url: String,
    pub long_title: String,
    pub artist: String,
}

impl ArtObject {
    pub fn work_item(&self) -> WorkItem {
        WorkItem { id: self.id, source_url: self.image_url.clone() }
    }
}

/// One (identity, source URL) pair awaiting embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: ObjectId,
    pub source_url: String,
}

impl WorkItem {
    pub fn new(id: ObjectId, source_url: impl Into<String>) -> Self {
        Self { id, source_url: source_url.into() }
    }
}

/// A successfully downloaded and decoded payload, tagged with its identity.
///
/// Never persisted: it lives on the raw queue until an embed worker takes it.
#[derive(Debug, Clone)]
pub struct DecodedImage<P> {
    pub id: ObjectId,
    pub payload: P,
}

/// The embedding produced for one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingVector {
    pub id: ObjectId,
    pub vector: Vec<f32>,
}

/// A nearest-neighbour result. Lower `distance` is closer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarHit {
    pub id: ObjectId,
    pub distance: f32,
}

/// Counts reported by a completed pipeline run.
///
/// `persisted <= embedded <= fetched` and
/// `fetched + failed_downloads` equals the number of submitted work items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub fetched: usize,
    pub failed_downloads: usize,
    pub embedded: usize,
    pub persisted: usize,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl RunReport {
    pub fn empty(elapsed: Duration) -> Self {
        Self { elapsed, ..Self::default() }
    }

    pub fn submitted(&self) -> usize {
        self.fetched + self.failed_downloads
    }
}
