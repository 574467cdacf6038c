use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use hybridseek_core::error::{Error, Result};
use hybridseek_core::traits::ChunkStore;
use hybridseek_core::types::ScoredHit;

/// Issues the vector and keyword top-k queries against the store.
///
/// Raw scores are returned untouched; the only fault originated here is
/// the timeout, reported as `UpstreamUnavailable`.
pub struct DualModeExecutor<S: ChunkStore + ?Sized> {
    store: Arc<S>,
    vector_index: String,
    fulltext_index: String,
    timeout: Duration,
}

impl<S: ChunkStore + ?Sized> DualModeExecutor<S> {
    pub fn new(store: Arc<S>, vector_index: &str, fulltext_index: &str, timeout: Duration) -> Self {
        Self {
            store,
            vector_index: vector_index.to_string(),
            fulltext_index: fulltext_index.to_string(),
            timeout,
        }
    }

    pub async fn run_vector(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredHit>> {
        let hits = self.bounded(&self.vector_index, self.store.vector_query(&self.vector_index, k, embedding)).await?;
        tracing::debug!(index = %self.vector_index, k, hits = hits.len(), "vector query");
        Ok(top_k(hits, k))
    }

    pub async fn run_keyword(&self, question: &str, k: usize) -> Result<Vec<ScoredHit>> {
        let hits = self.bounded(&self.fulltext_index, self.store.keyword_query(&self.fulltext_index, k, question)).await?;
        tracing::debug!(index = %self.fulltext_index, k, hits = hits.len(), "keyword query");
        Ok(top_k(hits, k))
    }

    /// Both queries concurrently; the first failure cancels the other.
    pub async fn run_both(&self, question: &str, embedding: &[f32], k: usize) -> Result<(Vec<ScoredHit>, Vec<ScoredHit>)> {
        tokio::try_join!(self.run_vector(embedding, k), self.run_keyword(question, k))
    }

    async fn bounded<T>(&self, index: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::upstream(
                "storage",
                format!("query on '{index}' timed out after {:?}", self.timeout),
            )),
        }
    }
}

/// Descending raw score, ties by chunk index, at most `k`.
fn top_k(mut hits: Vec<ScoredHit>, k: usize) -> Vec<ScoredHit> {
    hits.sort_by(|a, b| b.raw_score.total_cmp(&a.raw_score).then(a.index.cmp(&b.index)));
    hits.truncate(k);
    hits
}
