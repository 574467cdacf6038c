use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use hybridseek_core::config::RetrievalSettings;
use hybridseek_core::error::{Error, Result};
use hybridseek_core::traits::{ChunkStore, Embedder};
use hybridseek_core::types::{IndexDescriptor, NormalizedHit, Query};

use crate::executor::DualModeExecutor;
use crate::lifecycle::IndexLifecycle;
use crate::merge::{merge, rank_single};

/// Which retrieval modes a search uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    #[default]
    Hybrid,
    Vector,
    Keyword,
}

/// Hybrid retrieval over a [`ChunkStore`].
///
/// Indexes are ensured before the first search. When a query still reports
/// `IndexMissing`, the indexes are ensured again and the whole search is
/// retried once; a second miss surfaces as `IndexUnrecoverable`.
pub struct HybridSearchEngine<S: ChunkStore + ?Sized> {
    lifecycle: IndexLifecycle<S>,
    executor: DualModeExecutor<S>,
    embedder: Option<Arc<dyn Embedder>>,
    vector_descriptor: IndexDescriptor,
    dimensions: usize,
    default_k: usize,
}

impl<S: ChunkStore + ?Sized> HybridSearchEngine<S> {
    pub fn new(store: Arc<S>, settings: &RetrievalSettings) -> Self {
        let timeout = Duration::from_millis(settings.query_timeout_ms);
        Self {
            lifecycle: IndexLifecycle::new(store.clone(), settings.descriptors(), timeout),
            executor: DualModeExecutor::new(store, &settings.vector_index, &settings.fulltext_index, timeout),
            embedder: None,
            vector_descriptor: settings.vector_descriptor(),
            dimensions: settings.dimensions,
            default_k: settings.default_k,
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }

    pub fn lifecycle(&self) -> &IndexLifecycle<S> {
        &self.lifecycle
    }

    pub async fn ensure_indexes(&self) -> Result<()> {
        self.lifecycle.ensure_indexes().await
    }

    /// Embed `question` and run [`Self::search`].
    pub async fn hybrid_search(&self, question: &str, k: usize) -> Result<Vec<NormalizedHit>> {
        self.search_mode(question, k, SearchMode::Hybrid).await
    }

    pub async fn search_mode(&self, question: &str, k: usize, mode: SearchMode) -> Result<Vec<NormalizedHit>> {
        check_k(k)?;
        let embedding = match mode {
            SearchMode::Keyword => Vec::new(),
            _ => self.embed_question(question).await?,
        };
        let query = Query { question: question.to_string(), embedding, k };
        self.search_with_mode(&query, mode).await
    }

    /// Hybrid retrieval for a question whose embedding the caller computed.
    pub async fn search(&self, query: &Query) -> Result<Vec<NormalizedHit>> {
        self.search_with_mode(query, SearchMode::Hybrid).await
    }

    pub async fn search_with_mode(&self, query: &Query, mode: SearchMode) -> Result<Vec<NormalizedHit>> {
        check_k(query.k)?;
        if mode != SearchMode::Keyword {
            self.check_embedding(&query.embedding)?;
        }
        let (question, embedding, k) = (query.question.as_str(), query.embedding.as_slice(), query.k);
        let executor = &self.executor;
        let hits = match mode {
            SearchMode::Hybrid => {
                let (vector, keyword) = self.with_recovery(move || executor.run_both(question, embedding, k)).await?;
                merge(&vector, &keyword, k)
            }
            SearchMode::Vector => rank_single(&self.with_recovery(move || executor.run_vector(embedding, k)).await?, k),
            SearchMode::Keyword => rank_single(&self.with_recovery(move || executor.run_keyword(question, k)).await?, k),
        };
        tracing::debug!(?mode, k, hits = hits.len(), "search complete");
        Ok(hits)
    }

    async fn with_recovery<T, F, Fut>(&self, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.lifecycle.ensure_once().await?;
        match attempt().await {
            Err(Error::IndexMissing(name)) => {
                tracing::warn!(index = %name, "index missing, re-creating indexes and retrying once");
                self.lifecycle.ensure_indexes().await?;
                match attempt().await {
                    Err(Error::IndexMissing(name)) => Err(Error::IndexUnrecoverable(name)),
                    other => other,
                }
            }
            other => other,
        }
    }

    async fn embed_question(&self, question: &str) -> Result<Vec<f32>> {
        let Some(embedder) = self.embedder.clone() else {
            return Err(Error::InvalidConfig("no embedder configured for question embedding".into()));
        };
        let texts = vec![question.to_string()];
        let vectors = tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
            .await
            .map_err(|e| Error::upstream("embedder", e))?
            .map_err(|e| Error::upstream("embedder", e))?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| Error::upstream("embedder", "returned no vector for the question"))
    }

    fn check_embedding(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimensions {
            return Err(Error::configuration(
                &self.vector_descriptor,
                format!("question embedding has {} dimensions, expected {}", embedding.len(), self.dimensions),
            ));
        }
        Ok(())
    }
}

fn check_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(Error::InvalidQuery("k must be at least 1".into()));
    }
    Ok(())
}
