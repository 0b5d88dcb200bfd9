use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, info};

use artvec_core::error::PipelineError;
use artvec_core::traits::Embedder;
use artvec_core::types::{Batch, DecodedImage, EmbeddingVector};

use crate::signal::{Shutdown, Signals};

pub struct EmbedParams<P, E: ?Sized> {
    pub raw_rx: flume::Receiver<DecodedImage<P>>,
    pub result_tx: mpsc::Sender<Batch<EmbeddingVector>>,
    pub embedder: Arc<E>,
    pub batch_size: usize,
    pub workers: usize,
    pub dim: usize,
}

/// Runs `workers` embed workers over the shared raw queue, joins them all and
/// only then sets `embed_complete`. Returns the number of vectors produced.
pub async fn run_embed<P, E>(params: EmbedParams<P, E>, shutdown: Shutdown, signals: Arc<Signals>) -> Result<usize, PipelineError>
where
    P: Send + 'static,
    E: Embedder<P> + ?Sized + 'static,
{
    let _complete = signals.embed_complete.guard();
    let EmbedParams { raw_rx, result_tx, embedder, batch_size, workers, dim } = params;

    let handles: Vec<_> = (0..workers)
        .map(|worker| {
            tokio::spawn(embed_worker(
                worker,
                raw_rx.clone(),
                result_tx.clone(),
                embedder.clone(),
                batch_size,
                dim,
                shutdown.clone(),
            ))
        })
        .collect();
    // the workers now hold the only handles; the result queue closes when the last exits
    drop(raw_rx);
    drop(result_tx);

    let mut embedded = 0usize;
    let mut first_err = None;
    for (worker, joined) in join_all(handles).await.into_iter().enumerate() {
        match joined {
            Ok(Ok(n)) => embedded += n,
            Ok(Err(e)) => { first_err.get_or_insert(e); }
            Err(e) => {
                let err = PipelineError::Task(format!("embed worker {worker} panicked: {e}"));
                shutdown.fail(err.clone());
                first_err.get_or_insert(err);
            }
        }
    }
    if let Some(err) = first_err { return Err(err); }

    // fetch owns the upstream latch; embedding is complete only after it
    signals.fetch_complete.wait().await;
    info!(embedded, workers, "Embed stage complete");
    Ok(embedded)
}

async fn embed_worker<P, E>(
    worker: usize,
    raw_rx: flume::Receiver<DecodedImage<P>>,
    result_tx: mpsc::Sender<Batch<EmbeddingVector>>,
    embedder: Arc<E>,
    batch_size: usize,
    dim: usize,
    shutdown: Shutdown,
) -> Result<usize, PipelineError>
where
    P: Send + 'static,
    E: Embedder<P> + ?Sized + 'static,
{
    let mut embedded = 0usize;
    loop {
        let mut pending = Vec::new();
        let mut drained = false;
        while pending.len() < batch_size {
            tokio::select! {
                biased;
                _ = shutdown.terminated() => return Ok(embedded),
                item = raw_rx.recv_async() => match item {
                    Ok(item) => pending.push(item),
                    // closed and empty: flush what we have, then stop
                    Err(_) => { drained = true; break; }
                }
            }
        }

        if !pending.is_empty() {
            let batch = match embed_pending(pending, &embedder, dim).await {
                Ok(batch) => batch,
                Err(err) => {
                    shutdown.fail(err.clone());
                    return Err(err);
                }
            };
            let size = batch.len();
            tokio::select! {
                biased;
                _ = shutdown.terminated() => return Ok(embedded),
                sent = result_tx.send(batch) => {
                    if sent.is_err() {
                        // persist is gone; the orchestrator records why
                        debug!(worker, "Embed worker exiting: result queue closed");
                        return Ok(embedded);
                    }
                }
            }
            embedded += size;
            debug!(worker, size, embedded, "Embedded batch");
        }

        if drained {
            debug!(worker, embedded, "Embed worker exiting: raw queue drained");
            return Ok(embedded);
        }
    }
}

/// One embedder call for the whole accumulation, on the blocking pool.
async fn embed_pending<P, E>(pending: Vec<DecodedImage<P>>, embedder: &Arc<E>, dim: usize) -> Result<Batch<EmbeddingVector>, PipelineError>
where
    P: Send + 'static,
    E: Embedder<P> + ?Sized + 'static,
{
    let (ids, payloads): (Vec<_>, Vec<_>) = pending.into_iter().map(|d| (d.id, d.payload)).unzip();
    let embedder = embedder.clone();
    let vectors = tokio::task::spawn_blocking(move || embedder.embed_batch(&payloads))
        .await
        .map_err(|e| PipelineError::Task(format!("embedding task panicked: {e}")))?
        .map_err(|e| PipelineError::from_anyhow(e, PipelineError::Embedding))?;

    if vectors.len() != ids.len() {
        return Err(PipelineError::EmbeddingLength { expected: ids.len(), got: vectors.len() });
    }
    ids.into_iter()
        .zip(vectors)
        .map(|(id, vector)| {
            if vector.len() != dim {
                return Err(PipelineError::EmbeddingDimension { id, expected: dim, got: vector.len() });
            }
            Ok(EmbeddingVector { id, vector })
        })
        .collect()
}
