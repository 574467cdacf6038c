use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::time::Instant;

use candle_core::Device;
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use tokenizers::Tokenizer;

use hybridseek_core::traits::Embedder;

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_batch;

/// Sentence embeddings from a BERT checkpoint such as all-MiniLM-L6-v2:
/// masked mean pooling over the last hidden layer, L2-normalized.
pub struct MiniLmEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
    batch_size: usize,
}

impl MiniLmEmbedder {
    /// Load `tokenizer.json`, `config.json` and the weights from `model_dir`.
    /// `model.safetensors` is preferred; `pytorch_model.bin` is the fallback.
    pub fn load(model_dir: &Path, max_len: usize, batch_size: usize) -> Result<Self> {
        let device = select_device();
        tracing::info!(dir = %model_dir.display(), "loading sentence embedding model");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;

        let config_path = model_dir.join("config.json");
        let raw_config = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let config: BertConfig = serde_json::from_str(&raw_config)?;
        let dim = serde_json::from_str::<serde_json::Value>(&raw_config)?
            .get("hidden_size")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| anyhow!("{} has no hidden_size", config_path.display()))? as usize;

        let safetensors = model_dir.join("model.safetensors");
        let vb = if safetensors.exists() {
            // SAFETY: the weights file is not modified while the model is alive
            unsafe { VarBuilder::from_mmaped_safetensors(&[safetensors], DTYPE, &device)? }
        } else {
            VarBuilder::from_pth(model_dir.join("pytorch_model.bin"), DTYPE, &device)?
        };
        let model = BertModel::load(vb, &config)?;
        tracing::info!(dim, max_len, "sentence embedding model loaded");
        Ok(Self { model, tokenizer, device, dim, max_len, batch_size: batch_size.max(1) })
    }

    fn embed_group(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batch = tokenize_batch(&self.tokenizer, texts, self.max_len, &self.device)?;
        let hidden = self
            .model
            .forward(&batch.input_ids, &batch.token_type_ids, Some(&batch.attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &batch.attention_mask)?;
        Ok(pooled.to_device(&Device::Cpu)?.to_vec2::<f32>()?)
    }
}

impl Embedder for MiniLmEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        self.max_len
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let mut out = Vec::with_capacity(texts.len());
        for group in texts.chunks(self.batch_size) {
            out.extend(self.embed_group(group)?);
        }
        tracing::debug!(texts = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "embedded batch");
        Ok(out)
    }
}
