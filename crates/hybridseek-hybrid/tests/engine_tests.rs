use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hybridseek_core::config::RetrievalSettings;
use hybridseek_core::error::{Error, Result};
use hybridseek_core::traits::ChunkStore;
use hybridseek_core::types::{Chunk, IndexDescriptor, Query, ScoredHit, SourceKind};
use hybridseek_embed::HashingEmbedder;
use hybridseek_hybrid::{HybridSearchEngine, SearchMode};

const DIM: usize = 4;

/// What the scripted store answers for one query call.
enum Step {
    Hits(Vec<(u64, f32)>),
    Missing,
    Unavailable,
    Stall,
}

#[derive(Default)]
struct ScriptedStore {
    vector_steps: Mutex<VecDeque<Step>>,
    keyword_steps: Mutex<VecDeque<Step>>,
    conflict: bool,
    creates: AtomicUsize,
    vector_calls: AtomicUsize,
    keyword_calls: AtomicUsize,
}

impl ScriptedStore {
    fn with(vector: Vec<Step>, keyword: Vec<Step>) -> Self {
        Self {
            vector_steps: Mutex::new(vector.into()),
            keyword_steps: Mutex::new(keyword.into()),
            ..Default::default()
        }
    }

    async fn answer(steps: &Mutex<VecDeque<Step>>, index_name: &str, source: SourceKind) -> Result<Vec<ScoredHit>> {
        let step = steps.lock().unwrap().pop_front().unwrap_or(Step::Hits(vec![]));
        match step {
            Step::Hits(pairs) => Ok(pairs
                .into_iter()
                .map(|(index, raw_score)| ScoredHit { index, text: format!("chunk {index}"), raw_score, source })
                .collect()),
            Step::Missing => Err(Error::IndexMissing(index_name.to_string())),
            Step::Unavailable => Err(Error::upstream("storage", "connection refused")),
            Step::Stall => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(vec![])
            }
        }
    }
}

#[async_trait]
impl ChunkStore for ScriptedStore {
    async fn create_index(&self, descriptor: &IndexDescriptor) -> Result<()> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.conflict {
            return Err(Error::configuration(descriptor, "catalog holds a different definition"));
        }
        Ok(())
    }

    async fn vector_query(&self, index_name: &str, _k: usize, _embedding: &[f32]) -> Result<Vec<ScoredHit>> {
        self.vector_calls.fetch_add(1, Ordering::SeqCst);
        Self::answer(&self.vector_steps, index_name, SourceKind::Vector).await
    }

    async fn keyword_query(&self, index_name: &str, _k: usize, _question: &str) -> Result<Vec<ScoredHit>> {
        self.keyword_calls.fetch_add(1, Ordering::SeqCst);
        Self::answer(&self.keyword_steps, index_name, SourceKind::Keyword).await
    }

    async fn upsert_chunks(&self, chunks: &[Chunk]) -> Result<usize> {
        Ok(chunks.len())
    }
}

fn settings() -> RetrievalSettings {
    RetrievalSettings { dimensions: DIM, query_timeout_ms: 100, ..Default::default() }
}

fn engine(store: &Arc<ScriptedStore>) -> HybridSearchEngine<ScriptedStore> {
    HybridSearchEngine::new(store.clone(), &settings())
}

fn query(k: usize) -> Query {
    Query { question: "what did Einstein study".to_string(), embedding: vec![0.5; DIM], k }
}

fn pairs(hits: &[hybridseek_core::types::NormalizedHit]) -> Vec<(u64, f32)> {
    hits.iter().map(|h| (h.index, h.score)).collect()
}

#[tokio::test]
async fn merges_vector_and_keyword_lists() {
    let store = Arc::new(ScriptedStore::with(
        vec![Step::Hits(vec![(3, 0.8), (5, 0.4)])],
        vec![Step::Hits(vec![(5, 10.0), (7, 5.0)])],
    ));
    let hits = engine(&store).search(&query(2)).await.expect("search");
    assert_eq!(pairs(&hits), vec![(3, 1.0), (5, 1.0)]);
    assert_eq!(store.creates.load(Ordering::SeqCst), 2, "both indexes ensured before the first attempt");
}

#[tokio::test]
async fn empty_lists_are_not_an_error() {
    let store = Arc::new(ScriptedStore::default());
    let hits = engine(&store).search(&query(4)).await.expect("search");
    assert!(hits.is_empty());
}

#[tokio::test]
async fn indexes_are_ensured_once_across_searches() {
    let store = Arc::new(ScriptedStore::default());
    let engine = engine(&store);
    engine.search(&query(4)).await.expect("first");
    engine.search(&query(4)).await.expect("second");
    assert_eq!(store.creates.load(Ordering::SeqCst), 2);
    assert!(engine.lifecycle().is_ensured());
}

#[tokio::test]
async fn one_missing_index_is_recovered() {
    let store = Arc::new(ScriptedStore::with(
        vec![Step::Missing, Step::Hits(vec![(1, 0.9)])],
        vec![Step::Hits(vec![(2, 3.0)]), Step::Hits(vec![(2, 3.0)])],
    ));
    let hits = engine(&store).search(&query(4)).await.expect("recovered");
    assert_eq!(pairs(&hits), vec![(1, 1.0), (2, 1.0)]);
    assert_eq!(store.creates.load(Ordering::SeqCst), 4, "ensured before the first attempt and again before the retry");
    assert_eq!(store.vector_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn second_missing_index_is_fatal() {
    let store = Arc::new(ScriptedStore::with(vec![], vec![Step::Missing, Step::Missing, Step::Hits(vec![(1, 1.0)])]));
    let err = engine(&store).search(&query(4)).await.expect_err("unrecoverable");
    assert!(matches!(err, Error::IndexUnrecoverable(name) if name == "ftPdfChunk"));
    assert_eq!(store.keyword_calls.load(Ordering::SeqCst), 2, "retried exactly once");
}

#[tokio::test]
async fn configuration_fault_stops_before_querying() {
    let store = Arc::new(ScriptedStore { conflict: true, ..Default::default() });
    let err = engine(&store).search(&query(4)).await.expect_err("conflict");
    assert!(matches!(err, Error::ConfigurationFault { .. }));
    assert_eq!(store.vector_calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.creates.load(Ordering::SeqCst), 1, "first conflict aborts the ensure pass");
}

#[tokio::test]
async fn upstream_failures_are_not_retried() {
    let store = Arc::new(ScriptedStore::with(vec![Step::Unavailable], vec![]));
    let err = engine(&store).search(&query(4)).await.expect_err("unavailable");
    assert!(matches!(err, Error::UpstreamUnavailable { ref collaborator, .. } if collaborator == "storage"));
    assert_eq!(store.creates.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn stalled_query_times_out_as_upstream_unavailable() {
    let store = Arc::new(ScriptedStore::with(vec![], vec![Step::Stall]));
    let err = engine(&store).search(&query(4)).await.expect_err("timeout");
    assert!(matches!(err, Error::UpstreamUnavailable { .. }), "got {err}");
}

#[tokio::test]
async fn invalid_queries_are_rejected_up_front() {
    let store = Arc::new(ScriptedStore::default());
    let engine = engine(&store);
    assert!(matches!(engine.search(&query(0)).await, Err(Error::InvalidQuery(_))));

    let short = Query { embedding: vec![1.0; DIM - 1], ..query(4) };
    match engine.search(&short).await {
        Err(Error::ConfigurationFault { descriptor, .. }) => assert!(descriptor.contains("pdf")),
        other => panic!("expected configuration fault, got {other:?}"),
    }
    assert_eq!(store.creates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn single_mode_searches_touch_one_index() {
    let store = Arc::new(ScriptedStore::with(vec![], vec![Step::Hits(vec![(4, 2.0), (8, 1.0)])]));
    let engine = engine(&store);
    let hits = engine.search_with_mode(&Query { embedding: vec![], ..query(4) }, SearchMode::Keyword).await.expect("keyword");
    assert_eq!(pairs(&hits), vec![(4, 1.0), (8, 0.5)]);
    assert_eq!(store.vector_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn hybrid_search_embeds_the_question() {
    let store = Arc::new(ScriptedStore::with(vec![Step::Hits(vec![(1, 0.7)])], vec![]));
    let engine = engine(&store).with_embedder(Arc::new(HashingEmbedder::new(DIM)));
    let hits = engine.hybrid_search("relativity", 3).await.expect("search");
    assert_eq!(pairs(&hits), vec![(1, 1.0)]);

    let bare = HybridSearchEngine::new(store.clone(), &settings());
    assert!(matches!(bare.hybrid_search("relativity", 3).await, Err(Error::InvalidConfig(_))));
}

#[tokio::test]
async fn concurrent_searches_share_one_engine() {
    let store = Arc::new(ScriptedStore::default());
    let engine = Arc::new(engine(&store));
    let mut tasks = tokio::task::JoinSet::new();
    for k in 1..=8 {
        let engine = engine.clone();
        tasks.spawn(async move { engine.search(&query(k)).await });
    }
    while let Some(joined) = tasks.join_next().await {
        assert!(joined.expect("join").expect("search").is_empty());
    }
    let creates = store.creates.load(Ordering::SeqCst);
    assert!(creates >= 2 && creates % 2 == 0, "ensure runs whole passes, got {creates}");
}
