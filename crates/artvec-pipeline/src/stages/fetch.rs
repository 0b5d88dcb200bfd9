use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use artvec_core::batch::batched;
use artvec_core::error::PipelineError;
use artvec_core::traits::Downloader;
use artvec_core::types::{DecodedImage, WorkItem};

use crate::signal::{Shutdown, Signals};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchCounts {
    pub fetched: usize,
    pub failed: usize,
}

/// Downloads the work list in batches of `batch_size` and feeds the raw queue
/// item by item. Downloads of one batch run concurrently; the next batch starts
/// only after every download of the current one has settled.
///
/// Sets `fetch_complete` on every exit path. Dropping `raw_tx` on return closes
/// the raw queue for the embed workers.
pub async fn run_fetch<D>(
    items: Vec<WorkItem>,
    batch_size: usize,
    downloader: Arc<D>,
    raw_tx: flume::Sender<DecodedImage<D::Output>>,
    shutdown: Shutdown,
    signals: Arc<Signals>,
) -> Result<FetchCounts, PipelineError>
where
    D: Downloader + ?Sized + 'static,
{
    let _complete = signals.fetch_complete.guard();
    let total = items.len();
    let mut counts = FetchCounts::default();

    for (n, batch) in batched(items, batch_size).enumerate() {
        if shutdown.is_terminated() {
            info!(batch = n, "Fetch stage stopping: pipeline terminated");
            return Ok(counts);
        }
        let downloads = batch.into_iter().map(|item| {
            let downloader = downloader.clone();
            async move {
                let result = downloader.fetch(&item.source_url).await;
                (item, result)
            }
        });
        let results = tokio::select! {
            biased;
            _ = shutdown.terminated() => return Ok(counts),
            results = join_all(downloads) => results,
        };

        for (item, result) in results {
            let payload = match result {
                Ok(payload) => payload,
                Err(e) => {
                    counts.failed += 1;
                    warn!(id = item.id, url = %item.source_url, error = %format!("{e:#}"), "Skipping image: download failed");
                    continue;
                }
            };
            counts.fetched += 1;
            tokio::select! {
                biased;
                _ = shutdown.terminated() => return Ok(counts),
                sent = raw_tx.send_async(DecodedImage { id: item.id, payload }) => {
                    if sent.is_err() {
                        // every embed worker is gone; the orchestrator records why
                        debug!(id = item.id, "Fetch stage stopping: raw queue closed");
                        return Ok(counts);
                    }
                }
            }
        }
        debug!(batch = n, fetched = counts.fetched, failed = counts.failed, "Fetched batch");
    }

    info!(total, fetched = counts.fetched, failed = counts.failed, "Fetch stage complete");
    Ok(counts)
}
