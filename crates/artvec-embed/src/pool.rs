use anyhow::Result;
use candle_core::{DType, Tensor};

/// L2-normalise each row of a `[B, H]` tensor.
pub fn l2_normalize(embeddings: &Tensor) -> Result<Tensor> {
    let dims = embeddings.dims();
    anyhow::ensure!(dims.len() == 2, "embeddings shape must be [B,H], got {:?}", dims);

    let eps_val = match embeddings.dtype() { DType::F16 | DType::BF16 => 1e-6f32, _ => 1e-12f32 };
    let eps = Tensor::new(&[eps_val], embeddings.device())?.to_dtype(embeddings.dtype())?.unsqueeze(0)?;
    let norm = embeddings.sqr()?.sum_keepdim(1)?.sqrt()?;
    let norm = norm.broadcast_add(&eps)?;
    Ok(embeddings.broadcast_div(&norm)?)
}

/// Move a `[B, H]` tensor to the host as one `Vec<f32>` per row.
pub fn rows_to_vecs(embeddings: &Tensor) -> Result<Vec<Vec<f32>>> {
    let host = embeddings.to_device(&candle_core::Device::Cpu)?.to_dtype(DType::F32)?;
    Ok(host.to_vec2::<f32>()?)
}
