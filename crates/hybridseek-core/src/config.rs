//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars.
//! Nested keys in the environment use `__`, e.g. `APP_RETRIEVAL__DEFAULT_K=8`.
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{IndexDescriptor, Similarity};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?;
        tracing::debug!(env = %env_name, "configuration loaded");
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment: Figment::from(Serialized::defaults(Settings::default())).merge(figment) }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{key}': {e}")))
    }

    /// Typed, validated view of the whole configuration.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub retrieval: RetrievalSettings,
    pub store: StoreSettings,
    pub chunking: ChunkingSettings,
    pub embedding: EmbeddingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub vector_index: String,
    pub fulltext_index: String,
    pub vector_field: String,
    pub text_field: String,
    pub dimensions: usize,
    pub similarity: Similarity,
    pub default_k: usize,
    pub query_timeout_ms: u64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            vector_index: "pdf".to_string(),
            fulltext_index: "ftPdfChunk".to_string(),
            vector_field: "embedding".to_string(),
            text_field: "text".to_string(),
            dimensions: 384,
            similarity: Similarity::Cosine,
            default_k: 4,
            query_timeout_ms: 10_000,
        }
    }
}

impl RetrievalSettings {
    pub fn vector_descriptor(&self) -> IndexDescriptor {
        IndexDescriptor::vector(&self.vector_index, &self.vector_field, self.dimensions, self.similarity)
    }

    pub fn fulltext_descriptor(&self) -> IndexDescriptor {
        IndexDescriptor::fulltext(&self.fulltext_index, &self.text_field)
    }

    /// The two indexes hybrid retrieval depends on.
    pub fn descriptors(&self) -> Vec<IndexDescriptor> {
        vec![self.vector_descriptor(), self.fulltext_descriptor()]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub root: String,
    pub table: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self { root: "./data/hybridseek".to_string(), table: "chunks".to_string() }
    }
}

impl StoreSettings {
    /// Store root after `~`/`$VAR` expansion; relative roots resolve against `base`.
    pub fn root_path(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.root)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self { chunk_size: 500, overlap: 40 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model_dir: Option<String>,
    pub max_len: usize,
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { model_dir: None, max_len: 256, batch_size: 32 }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if r.default_k == 0 {
            return Err(Error::InvalidConfig("retrieval.default_k must be >= 1".into()));
        }
        if r.dimensions == 0 {
            return Err(Error::InvalidConfig("retrieval.dimensions must be >= 1".into()));
        }
        if r.vector_index == r.fulltext_index {
            return Err(Error::InvalidConfig(format!(
                "vector and fulltext indexes share the name '{}'",
                r.vector_index
            )));
        }
        if r.query_timeout_ms == 0 {
            return Err(Error::InvalidConfig("retrieval.query_timeout_ms must be > 0".into()));
        }
        let c = &self.chunking;
        if c.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunking.chunk_size must be >= 1".into()));
        }
        if c.overlap >= c.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunking.overlap ({}) must be smaller than chunk_size ({})",
                c.overlap, c.chunk_size
            )));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size must be >= 1".into()));
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
