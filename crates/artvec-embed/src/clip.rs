use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::clip::{ClipConfig, ClipModel};
use image::DynamicImage;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use artvec_core::traits::Embedder;

use crate::device::select_device;
use crate::pool::{l2_normalize, rows_to_vecs};
use crate::preprocess::images_to_batch;
use crate::tokenize::tokenize_batch;

/// Projection width of CLIP ViT-B/32.
pub const CLIP_DIM: usize = 512;
const MAX_TEXT_LEN: usize = 77;

/// CLIP ViT-B/32 with both towers loaded, producing L2-normalised vectors in
/// a shared image/text space.
pub struct ClipEmbedder {
    model: ClipModel,
    tokenizer: Tokenizer,
    device: Device,
    image_size: usize,
}

impl ClipEmbedder {
    pub fn new(model_dir: &Path) -> Result<Self> {
        let device = select_device();
        info!(dir = %model_dir.display(), "Loading CLIP ViT-B/32");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config = ClipConfig::vit_base_patch32();
        let weights = load_weights(model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = ClipModel::new(vb, &config)?;
        info!("CLIP model loaded");
        Ok(Self { model, tokenizer, device, image_size: config.image_size })
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        debug!(path = %safetensors.display(), "Reading safetensors weights");
        return Ok(candle_core::safetensors::load(&safetensors, device)?);
    }
    let pickle = model_dir.join("pytorch_model.bin");
    if pickle.exists() {
        debug!(path = %pickle.display(), "Reading pytorch weights");
        return Ok(candle_core::pickle::read_all(&pickle)?.into_iter().collect());
    }
    Err(anyhow!("No model.safetensors or pytorch_model.bin in {}", model_dir.display()))
}

impl Embedder<DynamicImage> for ClipEmbedder {
    fn dim(&self) -> usize { CLIP_DIM }

    fn embed_batch(&self, images: &[DynamicImage]) -> Result<Vec<Vec<f32>>> {
        if images.is_empty() { return Ok(Vec::new()); }
        let start = Instant::now();
        let pixels = images_to_batch(images, self.image_size, &self.device)?;
        let features = self.model.get_image_features(&pixels)?;
        let vectors = rows_to_vecs(&l2_normalize(&features)?)?;
        debug!(batch = images.len(), elapsed_ms = start.elapsed().as_millis() as u64, "Embedded images");
        Ok(vectors)
    }
}

impl Embedder<String> for ClipEmbedder {
    fn dim(&self) -> usize { CLIP_DIM }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() { return Ok(Vec::new()); }
        let start = Instant::now();
        let input_ids = tokenize_batch(&self.tokenizer, texts, MAX_TEXT_LEN, &self.device)?;
        let features = self.model.get_text_features(&input_ids)?;
        let vectors = rows_to_vecs(&l2_normalize(&features)?)?;
        debug!(batch = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "Embedded texts");
        Ok(vectors)
    }
}
