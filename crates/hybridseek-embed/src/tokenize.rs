use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

/// Token ids and attention mask for a batch, each `[B, T]`.
pub struct TokenBatch {
    pub input_ids: Tensor,
    pub attention_mask: Tensor,
    pub token_type_ids: Tensor,
}

/// Encode `texts`, truncate each to `max_len` tokens and right-pad the batch
/// to its longest member.
pub fn tokenize_batch(tokenizer: &Tokenizer, texts: &[String], max_len: usize, device: &Device) -> Result<TokenBatch> {
    let pad_id = tokenizer.token_to_id("[PAD]").unwrap_or(0);
    let encodings = tokenizer
        .encode_batch(texts.to_vec(), true)
        .map_err(|e| anyhow!("Tokenization failed: {}", e))?;

    let mut rows: Vec<(Vec<u32>, Vec<u32>)> = Vec::with_capacity(encodings.len());
    for enc in &encodings {
        let mut ids = enc.get_ids().to_vec();
        let mut mask = enc.get_attention_mask().to_vec();
        ids.truncate(max_len);
        mask.truncate(max_len);
        rows.push((ids, mask));
    }
    let width = rows.iter().map(|(ids, _)| ids.len()).max().unwrap_or(0).max(1);

    let batch = rows.len();
    let mut flat_ids = Vec::with_capacity(batch * width);
    let mut flat_mask = Vec::with_capacity(batch * width);
    for (mut ids, mut mask) in rows {
        ids.resize(width, pad_id);
        mask.resize(width, 0);
        flat_ids.extend(ids);
        flat_mask.extend(mask);
    }
    let input_ids = Tensor::from_vec(flat_ids, (batch, width), device)?;
    let attention_mask = Tensor::from_vec(flat_mask, (batch, width), device)?;
    let token_type_ids = input_ids.zeros_like()?;
    Ok(TokenBatch { input_ids, attention_mask, token_type_ids })
}
