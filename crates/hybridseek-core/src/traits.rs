use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Chunk, IndexDescriptor, ScoredHit};

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// The storage engine as seen by the retrieval core.
///
/// Implementations must report a missing index as `Error::IndexMissing` so
/// the caller can tell it apart from other failures, and must make
/// `create_index` idempotent under concurrent callers.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Create the index if absent. A live index with a different definition
    /// is a `ConfigurationFault`.
    async fn create_index(&self, descriptor: &IndexDescriptor) -> Result<()>;

    /// Top-k by vector similarity, descending.
    async fn vector_query(&self, index_name: &str, k: usize, embedding: &[f32]) -> Result<Vec<ScoredHit>>;

    /// Top-k by keyword relevance, descending.
    async fn keyword_query(&self, index_name: &str, k: usize, question: &str) -> Result<Vec<ScoredHit>>;

    /// Insert or replace chunks keyed by `index`. Returns rows written.
    async fn upsert_chunks(&self, chunks: &[Chunk]) -> Result<usize>;
}
