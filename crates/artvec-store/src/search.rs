use anyhow::{anyhow, Result};
use arrow_array::{Float32Array, Int64Array};
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::DistanceType;

use artvec_core::types::{ObjectId, SimilarHit};

use crate::lance::LanceStore;
use crate::table::column;

impl LanceStore {
    /// Cosine nearest neighbours of `query`, closest first.
    pub async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<SimilarHit>> {
        if query.len() != self.dim() {
            return Err(anyhow!("query vector has dimension {}, store holds {}", query.len(), self.dim()));
        }
        if k == 0 { return Ok(Vec::new()); }
        let table = self.embeddings().await?;
        let mut stream = table.vector_search(query.to_vec())?.distance_type(DistanceType::Cosine).limit(k).execute().await?;
        let mut hits = Vec::new();
        while let Some(batch) = futures::TryStreamExt::try_next(&mut stream).await? {
            let ids = column::<Int64Array>(&batch, "art_object_id")?;
            let distances = column::<Float32Array>(&batch, "_distance")?;
            for i in 0..batch.num_rows() {
                hits.push(SimilarHit { id: ids.value(i), distance: distances.value(i) });
            }
        }
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(hits)
    }

    /// Objects whose image embedding is closest to that of `id`, excluding `id`
    /// itself. `None` when `id` has no embedding yet.
    pub async fn similar_to(&self, id: ObjectId, k: usize) -> Result<Option<Vec<SimilarHit>>> {
        let Some(vector) = self.get_embedding(id).await? else { return Ok(None) };
        let mut hits = self.nearest(&vector, k + 1).await?;
        hits.retain(|h| h.id != id);
        hits.truncate(k);
        Ok(Some(hits))
    }
}
