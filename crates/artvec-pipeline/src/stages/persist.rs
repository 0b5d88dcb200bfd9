use std::sync::Arc;

use indicatif::ProgressBar;
use tokio::sync::mpsc;
use tracing::{debug, info};

use artvec_core::error::PipelineError;
use artvec_core::traits::VectorStore;
use artvec_core::types::{Batch, EmbeddingVector};

use crate::signal::{Shutdown, Signals};

/// Writes each result batch with one `bulk_write`, as it arrives.
///
/// A write that has started is never abandoned; termination is observed
/// between writes.
pub async fn run_persist<S>(
    mut result_rx: mpsc::Receiver<Batch<EmbeddingVector>>,
    store: Arc<S>,
    shutdown: Shutdown,
    signals: Arc<Signals>,
    progress: Option<ProgressBar>,
) -> Result<usize, PipelineError>
where
    S: VectorStore + ?Sized + 'static,
{
    let _complete = signals.all_persisted.guard();
    let mut persisted = 0usize;
    let mut writes = 0usize;

    loop {
        let batch = tokio::select! {
            biased;
            _ = shutdown.terminated() => return Ok(persisted),
            batch = result_rx.recv() => match batch {
                Some(batch) => batch,
                None => break,
            },
        };
        if let Err(e) = store.bulk_write(&batch).await {
            let err = PipelineError::from_anyhow(e, PipelineError::Storage);
            shutdown.fail(err.clone());
            return Err(err);
        }
        persisted += batch.len();
        writes += 1;
        if let Some(pb) = &progress { pb.inc(batch.len() as u64); }
        debug!(rows = batch.len(), persisted, "Persisted batch");
    }

    signals.embed_complete.wait().await;
    info!(persisted, writes, "Persist stage complete");
    Ok(persisted)
}
