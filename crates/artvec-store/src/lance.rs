//! LanceDB-backed inventory and embedding store.
//!
//! Two tables live in one database: the object inventory (`art_objects`) and
//! the embeddings side table (`embeddings`, one row per embedded object).
//! "Unembedded" is derived by anti-joining the two on the object id, so a
//! crashed run simply resumes where the last persisted batch left off.

use anyhow::{anyhow, Result};
use arrow_array::cast::AsArray;
use arrow_array::types::Float32Type;
use arrow_array::{
    FixedSizeListArray, Int64Array, RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray,
};
use async_trait::async_trait;
use chrono::Utc;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{Connection, Table};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use artvec_core::config::StoreSettings;
use artvec_core::error::PipelineError;
use artvec_core::traits::{VectorStore, WorkSource};
use artvec_core::types::{ArtObject, EmbeddingVector, ObjectId, WorkItem};

use crate::schema::{embeddings_schema, objects_schema, vector_dim};
use crate::table::{column, ensure_table, open_db};

pub struct LanceStore {
    pub(crate) conn: Connection,
    pub(crate) objects_table: String,
    pub(crate) embeddings_table: String,
    pub(crate) dim: i32,
}

impl LanceStore {
    /// Connects and creates both tables when missing. An existing embeddings
    /// table must have been written with the same vector width.
    pub async fn open(settings: &StoreSettings, dim: usize) -> Result<Self> {
        let uri = settings.resolved_uri();
        let conn = open_db(&uri).await?;
        let dim = i32::try_from(dim).map_err(|_| anyhow!("embedding dimension {} out of range", dim))?;
        ensure_table(&conn, &settings.objects_table, objects_schema()).await?;
        ensure_table(&conn, &settings.embeddings_table, embeddings_schema(dim)).await?;

        let existing = conn.open_table(&settings.embeddings_table).execute().await?.schema().await?;
        match vector_dim(&existing) {
            Some(d) if d == dim => {}
            other => {
                return Err(anyhow!(
                    "table '{}' stores vectors of width {:?}, embedder produces {}",
                    settings.embeddings_table,
                    other,
                    dim
                ))
            }
        }
        info!(uri = %uri, dim, "Opened LanceDB store");
        Ok(Self {
            conn,
            objects_table: settings.objects_table.clone(),
            embeddings_table: settings.embeddings_table.clone(),
            dim,
        })
    }

    pub fn dim(&self) -> usize { self.dim as usize }

    pub(crate) async fn objects(&self) -> Result<Table> {
        Ok(self.conn.open_table(&self.objects_table).execute().await?)
    }

    pub(crate) async fn embeddings(&self) -> Result<Table> {
        Ok(self.conn.open_table(&self.embeddings_table).execute().await?)
    }

    /// Upserts catalogue records keyed by `id`. Returns the number of rows touched.
    pub async fn import_objects(&self, objects: &[ArtObject]) -> Result<usize> {
        if objects.is_empty() { return Ok(0); }
        let schema = objects_schema();
        let rb = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int64Array::from_iter_values(objects.iter().map(|o| o.id))),
                Arc::new(StringArray::from_iter_values(objects.iter().map(|o| o.original_id.as_str()))),
                Arc::new(StringArray::from_iter_values(objects.iter().map(|o| o.image_url.as_str()))),
                Arc::new(StringArray::from_iter_values(objects.iter().map(|o| o.long_title.as_str()))),
                Arc::new(StringArray::from_iter_values(objects.iter().map(|o| o.artist.as_str()))),
            ],
        )?;
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(rb)].into_iter(), schema));
        let mut mi = self.objects().await?.merge_insert(&["id"]);
        mi.when_matched_update_all(None).when_not_matched_insert_all();
        let res = mi.execute(reader).await?;
        Ok((res.num_inserted_rows + res.num_updated_rows) as usize)
    }

    pub async fn count_objects(&self) -> Result<usize> {
        Ok(self.objects().await?.count_rows(None).await?)
    }

    pub async fn count_embeddings(&self) -> Result<usize> {
        Ok(self.embeddings().await?.count_rows(None).await?)
    }

    pub async fn embedded_ids(&self) -> Result<HashSet<ObjectId>> {
        let mut ids = HashSet::new();
        let mut stream = self.embeddings().await?.query().select(Select::columns(&["art_object_id"])).execute().await?;
        while let Some(batch) = futures::TryStreamExt::try_next(&mut stream).await? {
            ids.extend(column::<Int64Array>(&batch, "art_object_id")?.values().iter().copied());
        }
        Ok(ids)
    }

    pub async fn get_embedding(&self, id: ObjectId) -> Result<Option<Vec<f32>>> {
        let mut stream = self
            .embeddings()
            .await?
            .query()
            .only_if(format!("art_object_id = {}", id))
            .select(Select::columns(&["vector"]))
            .limit(1)
            .execute()
            .await?;
        while let Some(batch) = futures::TryStreamExt::try_next(&mut stream).await? {
            if batch.num_rows() == 0 { continue; }
            let vectors = column::<FixedSizeListArray>(&batch, "vector")?;
            let values = vectors.value(0);
            return Ok(Some(values.as_primitive::<Float32Type>().values().to_vec()));
        }
        Ok(None)
    }

    /// Looks up catalogue records, in no particular order. Unknown ids are skipped.
    pub async fn get_objects(&self, ids: &[ObjectId]) -> Result<Vec<ArtObject>> {
        if ids.is_empty() { return Ok(Vec::new()); }
        let list = ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(",");
        let mut stream = self.objects().await?.query().only_if(format!("id IN ({})", list)).execute().await?;
        let mut out = Vec::new();
        while let Some(batch) = futures::TryStreamExt::try_next(&mut stream).await? {
            out.extend(objects_from_batch(&batch)?);
        }
        Ok(out)
    }

    fn embeddings_batch(&self, batch: &[EmbeddingVector]) -> Result<RecordBatch> {
        let now = Utc::now().timestamp_millis();
        let vectors = batch.iter().map(|e| Some(e.vector.iter().copied().map(Some).collect::<Vec<_>>()));
        Ok(RecordBatch::try_new(
            embeddings_schema(self.dim),
            vec![
                Arc::new(Int64Array::from_iter_values(batch.iter().map(|e| e.id))),
                Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, self.dim)),
                Arc::new(TimestampMillisecondArray::from(vec![now; batch.len()])),
            ],
        )?)
    }
}

fn objects_from_batch(batch: &RecordBatch) -> Result<Vec<ArtObject>> {
    let ids = column::<Int64Array>(batch, "id")?;
    let original_ids = column::<StringArray>(batch, "original_id")?;
    let urls = column::<StringArray>(batch, "image_url")?;
    let titles = column::<StringArray>(batch, "long_title")?;
    let artists = column::<StringArray>(batch, "artist")?;
    Ok((0..batch.num_rows())
        .map(|i| ArtObject {
            id: ids.value(i),
            original_id: original_ids.value(i).to_string(),
            image_url: urls.value(i).to_string(),
            long_title: titles.value(i).to_string(),
            artist: artists.value(i).to_string(),
        })
        .collect())
}

#[async_trait]
impl WorkSource for LanceStore {
    async fn list_unembedded(&self, count: usize, offset: usize) -> Result<Vec<WorkItem>> {
        let done = self.embedded_ids().await?;
        // naive anti-join; the inventory is scanned once per run
        let mut pending = Vec::new();
        let mut stream = self.objects().await?.query().select(Select::columns(&["id", "image_url"])).execute().await?;
        while let Some(batch) = futures::TryStreamExt::try_next(&mut stream).await? {
            let ids = column::<Int64Array>(&batch, "id")?;
            let urls = column::<StringArray>(&batch, "image_url")?;
            for i in 0..batch.num_rows() {
                let id = ids.value(i);
                if !done.contains(&id) { pending.push(WorkItem::new(id, urls.value(i))); }
            }
        }
        pending.sort_by_key(|w| w.id);
        debug!(pending = pending.len(), embedded = done.len(), "Listed unembedded objects");
        Ok(pending.into_iter().skip(offset).take(count).collect())
    }
}

#[async_trait]
impl VectorStore for LanceStore {
    async fn bulk_write(&self, batch: &[EmbeddingVector]) -> Result<()> {
        if batch.is_empty() { return Err(PipelineError::EmptyBatch.into()); }
        if let Some(bad) = batch.iter().find(|e| e.vector.len() != self.dim as usize) {
            return Err(PipelineError::EmbeddingDimension { id: bad.id, expected: self.dim as usize, got: bad.vector.len() }.into());
        }
        let rb = self.embeddings_batch(batch)?;
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(rb)].into_iter(), embeddings_schema(self.dim)));
        // Upsert: re-embedding an object replaces its row
        let mut mi = self.embeddings().await?.merge_insert(&["art_object_id"]);
        mi.when_matched_update_all(None).when_not_matched_insert_all();
        mi.execute(reader).await?;
        debug!(rows = batch.len(), table = %self.embeddings_table, "Wrote embeddings");
        Ok(())
    }
}
