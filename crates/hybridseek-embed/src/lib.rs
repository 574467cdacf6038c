//! Sentence embedders: a candle BERT model for real runs and a hashing
//! embedder for tests and machines without model weights.

use anyhow::{anyhow, bail, Result};
use std::path::PathBuf;
use std::sync::Arc;

use hybridseek_core::config::{expand_path, EmbeddingSettings};
use hybridseek_core::traits::Embedder;

pub mod device;
pub mod hashing;
pub mod minilm;
pub mod pool;
pub mod tokenize;

pub use hashing::HashingEmbedder;
pub use minilm::MiniLmEmbedder;
pub use pool::masked_mean_l2;

const MODEL_NAME: &str = "all-MiniLM-L6-v2";

pub fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// The embedder for a store of `dimensions`-wide vectors.
///
/// `APP_USE_FAKE_EMBEDDINGS=1` selects [`HashingEmbedder`]. Otherwise the
/// model is loaded and its width must equal `dimensions`.
pub fn get_default_embedder(settings: &EmbeddingSettings, dimensions: usize) -> Result<Arc<dyn Embedder>> {
    if use_fake_embeddings() {
        tracing::info!(dimensions, "using hashing embedder");
        return Ok(Arc::new(HashingEmbedder::new(dimensions)));
    }
    let dir = resolve_model_dir(settings.model_dir.as_deref())?;
    let model = MiniLmEmbedder::load(&dir, settings.max_len, settings.batch_size)?;
    if model.dim() != dimensions {
        bail!(
            "model at {} produces {}-dimensional vectors, retrieval.dimensions is {}",
            dir.display(),
            model.dim(),
            dimensions
        );
    }
    Ok(Arc::new(model))
}

/// Locate the model directory: explicit setting, then `APP_MODEL_DIR`,
/// `MODEL_DIR`, then `models/all-MiniLM-L6-v2` relative to the working
/// directory or its parent.
pub fn resolve_model_dir(configured: Option<&str>) -> Result<PathBuf> {
    if let Some(dir) = configured {
        let p = expand_path(dir);
        if p.exists() {
            tracing::debug!(dir = %p.display(), "using configured model dir");
            return Ok(p);
        }
        bail!("configured embedding.model_dir {} does not exist", p.display());
    }
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = PathBuf::from(&dir);
            if p.exists() {
                tracing::debug!(dir = %p.display(), var, "using model dir from environment");
                return Ok(p);
            }
        }
    }
    for candidate in [PathBuf::from("models").join(MODEL_NAME), PathBuf::from("../models").join(MODEL_NAME)] {
        if candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(anyhow!("Could not locate {MODEL_NAME} model directory; set embedding.model_dir or APP_MODEL_DIR"))
}
