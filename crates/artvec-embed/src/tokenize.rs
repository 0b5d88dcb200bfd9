use anyhow::{Result, anyhow};
use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

/// CLIP uses the end-of-text token for padding.
pub const PAD_TOKEN: &str = "<|endoftext|>";

/// Tokenize `texts` into a `[B, T]` id tensor, right-padded to the longest
/// sequence and truncated to `max_len`.
pub fn tokenize_batch(tokenizer: &Tokenizer, texts: &[String], max_len: usize, device: &Device) -> Result<Tensor> {
    let pad_id = *tokenizer
        .get_vocab(true)
        .get(PAD_TOKEN)
        .ok_or_else(|| anyhow!("tokenizer has no {} token", PAD_TOKEN))?;

    let mut rows = Vec::with_capacity(texts.len());
    for text in texts {
        let enc = tokenizer.encode(text.as_str(), true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        let mut ids = enc.get_ids().to_vec();
        if ids.len() > max_len { ids.truncate(max_len); }
        rows.push(ids);
    }
    let longest = rows.iter().map(Vec::len).max().unwrap_or(0);
    for ids in &mut rows {
        ids.resize(longest, pad_id);
    }
    Ok(Tensor::new(rows, device)?)
}
