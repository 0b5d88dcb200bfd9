use std::sync::Arc;
use std::time::Instant;

use indicatif::ProgressBar;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use artvec_core::config::PipelineSettings;
use artvec_core::error::PipelineError;
use artvec_core::traits::{Downloader, Embedder, VectorStore, WorkSource};
use artvec_core::types::RunReport;

use crate::signal::{Shutdown, Signals};
use crate::stages::{run_embed, run_fetch, run_persist, EmbedParams};

/// Parameters of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub total_count: usize,
    pub fetch_batch_size: usize,
    pub embed_batch_size: usize,
    /// 0 derives the worker count from available parallelism.
    pub num_embed_workers: usize,
    pub offset: usize,
    pub raw_queue_capacity: Option<usize>,
    pub result_queue_capacity: Option<usize>,
}

impl RunRequest {
    pub fn new(total_count: usize, fetch_batch_size: usize, embed_batch_size: usize, num_embed_workers: usize) -> Self {
        Self {
            total_count,
            fetch_batch_size,
            embed_batch_size,
            num_embed_workers,
            offset: 0,
            raw_queue_capacity: None,
            result_queue_capacity: None,
        }
    }

    pub fn from_settings(settings: &PipelineSettings, total_count: usize) -> Self {
        Self {
            raw_queue_capacity: settings.raw_queue_capacity,
            result_queue_capacity: settings.result_queue_capacity,
            ..Self::new(total_count, settings.fetch_batch_size, settings.embed_batch_size, settings.embed_workers)
        }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_queue_capacities(mut self, raw: usize, result: usize) -> Self {
        self.raw_queue_capacity = Some(raw);
        self.result_queue_capacity = Some(result);
        self
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        PipelineSettings {
            fetch_batch_size: self.fetch_batch_size,
            embed_batch_size: self.embed_batch_size,
            embed_workers: self.num_embed_workers,
            raw_queue_capacity: self.raw_queue_capacity,
            result_queue_capacity: self.result_queue_capacity,
        }
        .validate()
    }

    pub fn workers(&self) -> usize {
        match self.num_embed_workers {
            0 => std::thread::available_parallelism().map(|n| n.get() / 3).unwrap_or(1).max(1),
            n => n,
        }
    }

    /// Raw queue capacity in items; by default a few embed batches per
    /// worker, and never less than one fetch batch.
    pub fn raw_capacity(&self) -> usize {
        self.raw_queue_capacity
            .unwrap_or_else(|| {
                self.embed_batch_size.saturating_mul(self.workers()).saturating_mul(4).max(self.fetch_batch_size)
            })
    }

    /// Result queue capacity in batches.
    pub fn result_capacity(&self) -> usize {
        self.result_queue_capacity.unwrap_or_else(|| self.workers().saturating_mul(2))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
    Completed(RunReport),
    Failed(PipelineError),
}

/// Orchestrates one Fetch task, N embed workers and one Persist task per run.
///
/// `D` produces the payload type `E` embeds; the work source and the store are
/// shared trait objects and may be the same value.
pub struct Pipeline<D: Downloader + ?Sized, E: ?Sized> {
    source: Arc<dyn WorkSource>,
    downloader: Arc<D>,
    embedder: Arc<E>,
    store: Arc<dyn VectorStore>,
    progress: Option<ProgressBar>,
    cancel: CancellationToken,
    state: watch::Sender<PipelineState>,
}

impl<D, E> Pipeline<D, E>
where
    D: Downloader + ?Sized + 'static,
    E: Embedder<D::Output> + ?Sized + 'static,
{
    pub fn new(source: Arc<dyn WorkSource>, downloader: Arc<D>, embedder: Arc<E>, store: Arc<dyn VectorStore>) -> Self {
        let (state, _) = watch::channel(PipelineState::Idle);
        Self { source, downloader, embedder, store, progress: None, cancel: CancellationToken::new(), state }
    }

    /// Advance `progress` by the number of persisted vectors.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Runs stop with [`PipelineError::Cancelled`] once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn state(&self) -> PipelineState { self.state.borrow().clone() }

    pub fn subscribe(&self) -> watch::Receiver<PipelineState> { self.state.subscribe() }

    pub async fn run(&self, request: RunRequest) -> Result<RunReport, PipelineError> {
        request.validate()?;
        let started = Instant::now();

        let items = match self.source.list_unembedded(request.total_count, request.offset).await {
            Ok(items) => items,
            Err(e) => return Err(self.failed(PipelineError::from_anyhow(e, PipelineError::Source))),
        };
        if items.is_empty() {
            info!(offset = request.offset, "Nothing to embed");
            let report = RunReport::empty(started.elapsed());
            self.state.send_replace(PipelineState::Completed(report));
            return Ok(report);
        }

        let workers = request.workers();
        let total = items.len();
        info!(
            items = total,
            fetch_batch = request.fetch_batch_size,
            embed_batch = request.embed_batch_size,
            workers,
            raw_capacity = request.raw_capacity(),
            result_capacity = request.result_capacity(),
            "Starting embedding pipeline"
        );
        self.state.send_replace(PipelineState::Running);
        if let Some(pb) = &self.progress { pb.set_length(total as u64); }

        let shutdown = Shutdown::new(self.cancel.child_token());
        let signals = Arc::new(Signals::default());
        let (raw_tx, raw_rx) = flume::bounded(request.raw_capacity());
        let (result_tx, result_rx) = mpsc::channel(request.result_capacity());

        // downstream first, so nothing is produced before its consumer exists
        let persist = tokio::spawn(run_persist(
            result_rx,
            self.store.clone(),
            shutdown.clone(),
            signals.clone(),
            self.progress.clone(),
        ));
        let embed = tokio::spawn(run_embed(
            EmbedParams {
                raw_rx,
                result_tx,
                embedder: self.embedder.clone(),
                batch_size: request.embed_batch_size,
                workers,
                dim: self.embedder.dim(),
            },
            shutdown.clone(),
            signals.clone(),
        ));
        let fetch = tokio::spawn(run_fetch(
            items,
            request.fetch_batch_size,
            self.downloader.clone(),
            raw_tx,
            shutdown.clone(),
            signals.clone(),
        ));

        let (fetch, embed, persist) = tokio::join!(fetch, embed, persist);
        let fetch = settle("fetch", fetch, &shutdown);
        let embedded = settle("embed", embed, &shutdown);
        let persisted = settle("persist", persist, &shutdown);

        if let Some(err) = shutdown.failure() {
            if let Some(pb) = &self.progress { pb.abandon_with_message("failed"); }
            return Err(self.failed(err));
        }
        let (Some(fetch), Some(embedded), Some(persisted)) = (fetch, embedded, persisted) else {
            return Err(self.failed(PipelineError::Task("stage exited without a result".into())));
        };
        if !signals.all_set() {
            return Err(self.failed(PipelineError::Task("stages joined with a completion latch unset".into())));
        }
        if shutdown.is_terminated() {
            if let Some(pb) = &self.progress { pb.abandon_with_message("cancelled"); }
            info!(persisted, "Pipeline cancelled");
            return Err(self.failed(PipelineError::Cancelled));
        }

        let report = RunReport {
            fetched: fetch.fetched,
            failed_downloads: fetch.failed,
            embedded,
            persisted,
            elapsed: started.elapsed(),
        };
        if let Some(pb) = &self.progress { pb.finish_with_message("done"); }
        info!(
            submitted = report.submitted(),
            fetched = report.fetched,
            failed_downloads = report.failed_downloads,
            embedded = report.embedded,
            persisted = report.persisted,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Pipeline completed"
        );
        self.state.send_replace(PipelineState::Completed(report));
        Ok(report)
    }

    fn failed(&self, err: PipelineError) -> PipelineError {
        error!(error = %err, "Pipeline failed");
        self.state.send_replace(PipelineState::Failed(err.clone()));
        err
    }
}

/// Unwraps a joined stage; errors are funnelled into `shutdown`.
fn settle<T>(stage: &str, joined: Result<Result<T, PipelineError>, JoinError>, shutdown: &Shutdown) -> Option<T> {
    match joined {
        Ok(Ok(value)) => Some(value),
        Ok(Err(err)) => {
            // stages record their own failures; only an unrecorded one is new
            if shutdown.failure().is_none() { shutdown.fail(err); }
            None
        }
        Err(e) => {
            shutdown.fail(PipelineError::Task(format!("{stage} stage panicked: {e}")));
            None
        }
    }
}
