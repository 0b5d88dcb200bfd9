use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use image::DynamicImage;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use artvec_cli::{init_tracing, progress_bar, read_objects};
use artvec_core::batch::batched;
use artvec_core::config::{Config, ModelSettings};
use artvec_core::traits::Embedder;
use artvec_core::types::SimilarHit;
use artvec_embed::{embedding_dim, get_default_embedder, ArtEmbedder};
use artvec_pipeline::{HttpDownloader, Pipeline, RunRequest};
use artvec_store::LanceStore;

const IMPORT_BATCH: usize = 1000;

#[derive(Parser, Debug)]
#[command(name = "artvec", about = "Bulk image embedding for art collections")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load art objects from a JSONL file into the inventory (upsert by id)
    Import { path: PathBuf },
    /// Download, embed and store images of objects without an embedding
    Embed {
        /// Maximum number of objects to process in this run
        #[arg(long)]
        count: Option<usize>,
        /// Skip this many unembedded objects (by ascending id)
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long)]
        fetch_batch: Option<usize>,
        #[arg(long)]
        embed_batch: Option<usize>,
        /// Embed workers; 0 derives the count from the CPU count
        #[arg(long)]
        workers: Option<usize>,
        #[arg(long, default_value_t = false)]
        no_progress: bool,
    },
    /// Show how many objects are embedded
    Status,
    /// Nearest neighbours of an object's image or of a text query
    Similar {
        #[arg(long, conflicts_with = "text", required_unless_present = "text")]
        id: Option<i64>,
        #[arg(long)]
        text: Option<String>,
        #[arg(long, short, default_value_t = 10)]
        k: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::load()?;
    let model = config.model()?;
    let store = Arc::new(LanceStore::open(&config.store()?, embedding_dim(&model)).await?);

    match cli.command {
        Command::Import { path } => {
            let objects = read_objects(&path)?;
            let mut imported = 0usize;
            for chunk in batched(objects, IMPORT_BATCH) {
                imported += store.import_objects(&chunk).await?;
            }
            info!(imported, path = %path.display(), "Import complete");
        }
        Command::Embed { count, offset, fetch_batch, embed_batch, workers, no_progress } => {
            let settings = config.pipeline()?;
            let mut request = RunRequest::from_settings(&settings, count.unwrap_or(usize::MAX)).with_offset(offset);
            if let Some(n) = fetch_batch { request.fetch_batch_size = n; }
            if let Some(n) = embed_batch { request.embed_batch_size = n; }
            if let Some(n) = workers { request.num_embed_workers = n; }

            let token = CancellationToken::new();
            tokio::spawn({
                let token = token.clone();
                async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        warn!("Interrupted, stopping after in-flight writes");
                        token.cancel();
                    }
                }
            });

            let embedder = load_embedder(&model, store.dim())?;
            let downloader = Arc::new(HttpDownloader::new(&config.http()?)?);
            let mut pipeline = Pipeline::new(store.clone(), downloader, embedder, store.clone()).with_cancellation(token);
            if !no_progress { pipeline = pipeline.with_progress(progress_bar()?); }
            let report = pipeline.run(request).await?;
            println!(
                "fetched={} failed_downloads={} embedded={} persisted={} elapsed={:.1}s",
                report.fetched,
                report.failed_downloads,
                report.embedded,
                report.persisted,
                report.elapsed.as_secs_f64()
            );
        }
        Command::Status => {
            let objects = store.count_objects().await?;
            let embedded = store.count_embeddings().await?;
            println!("objects={} embedded={} remaining={}", objects, embedded, objects.saturating_sub(embedded));
        }
        Command::Similar { id, text, k } => {
            let hits = match (id, text) {
                (Some(id), _) => store.similar_to(id, k).await?.ok_or_else(|| anyhow!("object {} has no embedding yet", id))?,
                (None, Some(text)) => {
                    let embedder = load_embedder(&model, store.dim())?;
                    let query = embed_text(embedder.as_ref(), text)?;
                    store.nearest(&query, k).await?
                }
                (None, None) => return Err(anyhow!("either --id or --text is required")),
            };
            print_hits(&store, &hits).await?;
        }
    }
    Ok(())
}

fn load_embedder(model: &ModelSettings, dim: usize) -> Result<Arc<dyn ArtEmbedder>> {
    let embedder = get_default_embedder(model)?;
    let produced = Embedder::<DynamicImage>::dim(embedder.as_ref());
    if produced != dim {
        return Err(anyhow!("embedder produces {}-d vectors, store holds {}-d", produced, dim));
    }
    Ok(embedder)
}

fn embed_text(embedder: &dyn ArtEmbedder, text: String) -> Result<Vec<f32>> {
    Embedder::<String>::embed_batch(embedder, &[text])?
        .pop()
        .ok_or_else(|| anyhow!("embedder returned no vector for the query"))
}

async fn print_hits(store: &LanceStore, hits: &[SimilarHit]) -> Result<()> {
    let ids: Vec<i64> = hits.iter().map(|h| h.id).collect();
    let objects = store.get_objects(&ids).await?;
    for hit in hits {
        match objects.iter().find(|o| o.id == hit.id) {
            Some(o) => println!("{:>8}  {:.4}  {} ({})", hit.id, hit.distance, o.long_title, o.artist),
            None => println!("{:>8}  {:.4}", hit.id, hit.distance),
        }
    }
    Ok(())
}
