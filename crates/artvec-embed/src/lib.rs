//! Embedding functions for art images and text queries.
//!
//! `ClipEmbedder` runs CLIP ViT-B/32 through candle. `FakeEmbedder` is a
//! deterministic hashing stand-in selected with `APP_USE_FAKE_EMBEDDINGS=1`
//! (or `model.use_fake`), so pipelines and tests run without model weights.

use anyhow::{Result, anyhow};
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;

use image::DynamicImage;
use tracing::info;
use twox_hash::XxHash64;

use artvec_core::config::{expand_path, ModelSettings};
use artvec_core::traits::Embedder;

pub mod clip;
pub mod device;
pub mod pool;
pub mod preprocess;
pub mod tokenize;

pub use clip::{ClipEmbedder, CLIP_DIM};
pub use pool::l2_normalize;

/// An embedder that maps both images and texts into one vector space.
pub trait ArtEmbedder: Embedder<DynamicImage> + Embedder<String> {}

impl<T> ArtEmbedder for T where T: Embedder<DynamicImage> + Embedder<String> {}

/// Token/pixel hashing embedder. Same input, same L2-normalised vector.
pub struct FakeEmbedder { dim: usize }

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    fn bucket(&self, key: impl Hash) -> (usize, f32) {
        let mut hasher = XxHash64::with_seed(0);
        key.hash(&mut hasher);
        let h = hasher.finish();
        let idx = (h % self.dim as u64) as usize;
        let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
        (idx, val)
    }
}

fn normalized(mut v: Vec<f32>) -> Vec<f32> {
    let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
    for x in &mut v { *x /= norm; }
    v
}

impl Embedder<String> for FakeEmbedder {
    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0f32; self.dim];
                for (i, token) in text.split_whitespace().enumerate() {
                    let (idx, val) = self.bucket(token);
                    v[idx] += val + (i as f32 % 3.0) * 0.01;
                }
                normalized(v)
            })
            .collect())
    }
}

impl Embedder<DynamicImage> for FakeEmbedder {
    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, images: &[DynamicImage]) -> Result<Vec<Vec<f32>>> {
        Ok(images
            .iter()
            .map(|image| {
                let thumb = image.thumbnail_exact(8, 8).to_rgb8();
                let mut v = vec![0f32; self.dim];
                for (i, px) in thumb.pixels().enumerate() {
                    // quantise so tiny resampling differences land in the same bucket
                    let [r, g, b] = px.0;
                    let (idx, val) = self.bucket((i, r >> 4, g >> 4, b >> 4));
                    v[idx] += val + 0.01;
                }
                normalized(v)
            })
            .collect())
    }
}

fn use_fake_from_env() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Vector width of the embedder `settings` select, without loading it.
pub fn embedding_dim(settings: &ModelSettings) -> usize {
    if settings.use_fake || use_fake_from_env() { settings.fake_dim.max(1) } else { CLIP_DIM }
}

pub fn get_default_embedder(settings: &ModelSettings) -> Result<Arc<dyn ArtEmbedder>> {
    if settings.use_fake || use_fake_from_env() {
        info!(dim = settings.fake_dim, "Using FakeEmbedder");
        return Ok(Arc::new(FakeEmbedder::new(settings.fake_dim)));
    }
    let dir = resolve_model_dir(settings)?;
    Ok(Arc::new(ClipEmbedder::new(&dir)?))
}

fn resolve_model_dir(settings: &ModelSettings) -> Result<PathBuf> {
    if let Some(dir) = &settings.dir {
        let p = expand_path(dir);
        if p.exists() { return Ok(p); }
        return Err(anyhow!("Configured model dir {} does not exist", p.display()));
    }
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = expand_path(&dir);
            if p.exists() { info!(dir = %p.display(), "Using {}", var); return Ok(p); }
        }
    }
    for candidate in ["models/clip-vit-base-patch32", "../models/clip-vit-base-patch32"] {
        let p = PathBuf::from(candidate);
        if p.exists() { info!(dir = %p.display(), "Using model dir"); return Ok(p); }
    }
    Err(anyhow!("Could not locate the CLIP model directory"))
}
