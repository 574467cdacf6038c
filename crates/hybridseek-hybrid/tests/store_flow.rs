use std::sync::Arc;

use hybridseek_core::config::RetrievalSettings;
use hybridseek_core::error::Error;
use hybridseek_core::traits::{ChunkStore, Embedder};
use hybridseek_core::types::{Chunk, IndexDescriptor, Similarity};
use hybridseek_embed::HashingEmbedder;
use hybridseek_hybrid::{HybridSearchEngine, LocalChunkStore, SearchMode};
use hybridseek_text::FulltextIndex;
use tempfile::TempDir;
use tokio::task::JoinSet;

const DIM: usize = 32;

const PASSAGES: [&str; 4] = [
    "Einstein was interested in experimental physics as a young man",
    "The patent office examined electrical devices",
    "Relativity describes space and time",
    "Bread rises when yeast ferments sugar",
];

fn settings() -> RetrievalSettings {
    RetrievalSettings { dimensions: DIM, ..Default::default() }
}

fn chunks(embedder: &HashingEmbedder) -> Vec<Chunk> {
    PASSAGES
        .iter()
        .enumerate()
        .map(|(i, text)| Chunk { index: i as u64, text: text.to_string(), embedding: embedder.embed_text(text) })
        .collect()
}

fn chunk(embedder: &HashingEmbedder, index: u64, text: &str) -> Chunk {
    Chunk { index, text: text.to_string(), embedding: embedder.embed_text(text) }
}

fn fulltext_dir(tmp: &TempDir) -> std::path::PathBuf {
    tmp.path().join("fulltext").join("ftPdfChunk")
}

async fn store(tmp: &TempDir) -> Arc<LocalChunkStore> {
    Arc::new(LocalChunkStore::open(tmp.path(), "chunks", "embedding").await.expect("store"))
}

#[tokio::test]
async fn ingest_then_hybrid_search() {
    let tmp = TempDir::new().expect("tmp");
    let store = store(&tmp).await;
    let embedder = Arc::new(HashingEmbedder::new(DIM));
    let engine = HybridSearchEngine::new(store.clone(), &settings()).with_embedder(embedder.clone());

    engine.ensure_indexes().await.expect("ensure");
    assert_eq!(store.upsert_chunks(&chunks(&embedder)).await.expect("upsert"), 4);

    let hits = engine.hybrid_search("experimental physics", 2).await.expect("search");
    eprintln!("hybrid 'experimental physics' -> {hits:?}");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].index, 0);
    assert_eq!(hits[0].score, 1.0);
    assert!(hits.iter().all(|h| (0.0..=1.0).contains(&h.score)));

    let keyword = engine.search_mode("yeast", 4, SearchMode::Keyword).await.expect("keyword");
    assert_eq!(keyword.len(), 1);
    assert_eq!(keyword[0].index, 3);

    let vector = engine.search_mode("relativity describes space and time", 1, SearchMode::Vector).await.expect("vector");
    assert_eq!(vector[0].index, 2);
}

#[tokio::test]
async fn ensure_is_idempotent_and_conflicts_are_faults() {
    let tmp = TempDir::new().expect("tmp");
    let store = store(&tmp).await;
    let engine = HybridSearchEngine::new(store.clone(), &settings());
    engine.ensure_indexes().await.expect("first");
    engine.ensure_indexes().await.expect("second");

    let status = store.status().await.expect("status");
    assert_eq!(status.indexes.len(), 2);
    assert_eq!(status.dimensions, Some(DIM));
    assert_eq!(status.rows, 0);

    let wider = IndexDescriptor::vector("pdf", "embedding", DIM * 2, Similarity::Cosine);
    assert!(matches!(store.create_index(&wider).await, Err(Error::ConfigurationFault { .. })));
    let other_metric = IndexDescriptor::vector("pdf", "embedding", DIM, Similarity::Euclidean);
    assert!(matches!(store.create_index(&other_metric).await, Err(Error::ConfigurationFault { .. })));
    let other_kind = IndexDescriptor::fulltext("pdf", "text");
    assert!(matches!(store.create_index(&other_kind).await, Err(Error::ConfigurationFault { .. })));
}

#[tokio::test]
async fn queries_before_ensure_report_index_missing() {
    let tmp = TempDir::new().expect("tmp");
    let store = store(&tmp).await;
    assert!(matches!(store.keyword_query("ftPdfChunk", 4, "x").await, Err(Error::IndexMissing(_))));
    assert!(matches!(store.vector_query("pdf", 4, &[0.0; DIM]).await, Err(Error::IndexMissing(_))));
}

#[tokio::test]
async fn fulltext_index_created_late_is_backfilled() {
    let tmp = TempDir::new().expect("tmp");
    let store = store(&tmp).await;
    let embedder = HashingEmbedder::new(DIM);
    let settings = settings();
    store.create_index(&settings.vector_descriptor()).await.expect("vector");
    store.upsert_chunks(&chunks(&embedder)).await.expect("upsert");

    store.create_index(&settings.fulltext_descriptor()).await.expect("fulltext");
    let hits = store.keyword_query("ftPdfChunk", 4, "patent").await.expect("keyword");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].index, 1);
}

#[tokio::test]
async fn deleted_fulltext_directory_is_rebuilt_on_retry() {
    let tmp = TempDir::new().expect("tmp");
    let store = store(&tmp).await;
    let embedder = Arc::new(HashingEmbedder::new(DIM));
    let engine = HybridSearchEngine::new(store.clone(), &settings()).with_embedder(embedder.clone());
    engine.ensure_indexes().await.expect("ensure");
    store.upsert_chunks(&chunks(&embedder)).await.expect("upsert");

    std::fs::remove_dir_all(tmp.path().join("fulltext").join("ftPdfChunk")).expect("remove");
    let hits = engine.search_mode("yeast", 4, SearchMode::Keyword).await.expect("recovered");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].index, 3);
}

#[tokio::test]
async fn reingesting_an_index_replaces_the_chunk() {
    let tmp = TempDir::new().expect("tmp");
    let store = store(&tmp).await;
    let embedder = Arc::new(HashingEmbedder::new(DIM));
    let engine = HybridSearchEngine::new(store.clone(), &settings()).with_embedder(embedder.clone());
    engine.ensure_indexes().await.expect("ensure");
    store.upsert_chunks(&chunks(&embedder)).await.expect("upsert");

    let text = "Sourdough starters need regular feeding";
    let replacement = Chunk { index: 3, text: text.to_string(), embedding: embedder.embed_batch(&[text.to_string()]).expect("embed").remove(0) };
    store.upsert_chunks(&[replacement]).await.expect("replace");

    assert_eq!(store.status().await.expect("status").rows, 4);
    assert!(engine.search_mode("yeast", 4, SearchMode::Keyword).await.expect("old").is_empty());
    let hits = engine.hybrid_search("sourdough", 4).await.expect("new");
    assert!(hits.iter().any(|h| h.index == 3 && h.score == 1.0));
    assert_eq!(hits.iter().filter(|h| h.index == 3).count(), 1);
}

#[tokio::test]
async fn mismatched_chunk_dimensions_are_rejected() {
    let tmp = TempDir::new().expect("tmp");
    let store = store(&tmp).await;
    store.create_index(&settings().vector_descriptor()).await.expect("vector");
    let bad = Chunk { index: 0, text: "short vector".into(), embedding: vec![1.0; DIM / 2] };
    assert!(matches!(store.upsert_chunks(&[bad]).await, Err(Error::ConfigurationFault { .. })));
}

#[tokio::test]
async fn stale_fulltext_directory_without_catalog_entry_is_rebuilt() {
    let tmp = TempDir::new().expect("tmp");
    let store = store(&tmp).await;
    let embedder = HashingEmbedder::new(DIM);
    let settings = settings();
    store.create_index(&settings.vector_descriptor()).await.expect("vector");
    store.upsert_chunks(&chunks(&embedder)).await.expect("upsert");

    // What an interrupted create leaves behind: an empty index on disk, nothing in the catalog
    FulltextIndex::rebuild(&fulltext_dir(&tmp), &settings.fulltext_descriptor(), std::iter::empty()).expect("stale index");

    HybridSearchEngine::new(store.clone(), &settings).ensure_indexes().await.expect("ensure");
    let hits = store.keyword_query("ftPdfChunk", 4, "patent").await.expect("keyword");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].index, 1);
}

#[tokio::test]
async fn upsert_into_deleted_fulltext_directory_keeps_older_chunks() {
    let tmp = TempDir::new().expect("tmp");
    let store = store(&tmp).await;
    let embedder = HashingEmbedder::new(DIM);
    HybridSearchEngine::new(store.clone(), &settings()).ensure_indexes().await.expect("ensure");
    store.upsert_chunks(&chunks(&embedder)).await.expect("upsert");

    std::fs::remove_dir_all(fulltext_dir(&tmp)).expect("remove");
    store.upsert_chunks(&[chunk(&embedder, 4, "Lanterns burn kerosene")]).await.expect("upsert after delete");

    assert_eq!(store.keyword_query("ftPdfChunk", 4, "yeast").await.expect("old")[0].index, 3);
    assert_eq!(store.keyword_query("ftPdfChunk", 4, "lanterns").await.expect("new")[0].index, 4);
    let status = store.status().await.expect("status");
    assert!(status.indexes.iter().any(|(d, docs)| d.name == "ftPdfChunk" && *docs == Some(5)));
}

#[tokio::test]
async fn failed_fulltext_write_keeps_chunk_table_unchanged() {
    let tmp = TempDir::new().expect("tmp");
    let store = store(&tmp).await;
    let embedder = HashingEmbedder::new(DIM);
    HybridSearchEngine::new(store.clone(), &settings()).ensure_indexes().await.expect("ensure");
    store.upsert_chunks(&chunks(&embedder)).await.expect("upsert");

    let raw = tantivy::Index::open_in_dir(fulltext_dir(&tmp)).expect("open raw");
    let lock: tantivy::IndexWriter = raw.writer_with_num_threads(1, 15_000_000).expect("hold writer");
    let lantern = chunk(&embedder, 4, "Lanterns burn kerosene");
    assert!(store.upsert_chunks(&[lantern.clone()]).await.is_err());
    assert!(!store.content_hashes().await.expect("hashes").contains_key(&4));
    assert_eq!(store.status().await.expect("status").rows, 4);

    drop(lock);
    store.upsert_chunks(&[lantern]).await.expect("retry");
    assert_eq!(store.keyword_query("ftPdfChunk", 4, "lanterns").await.expect("keyword")[0].index, 4);
}

#[tokio::test]
async fn concurrent_handles_ensure_one_root() {
    let tmp = TempDir::new().expect("tmp");
    let root = tmp.path().to_path_buf();
    let mut tasks = JoinSet::new();
    for _ in 0..4 {
        let root = root.clone();
        tasks.spawn(async move {
            let store = Arc::new(LocalChunkStore::open(&root, "chunks", "embedding").await?);
            HybridSearchEngine::new(store, &settings()).ensure_indexes().await
        });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.expect("task").expect("ensure from a concurrent handle");
    }

    let store = store(&tmp).await;
    let status = store.status().await.expect("status");
    assert_eq!(status.indexes.len(), 2);
    assert_eq!(status.dimensions, Some(DIM));

    let embedder = HashingEmbedder::new(DIM);
    store.upsert_chunks(&chunks(&embedder)).await.expect("upsert");
    assert_eq!(store.keyword_query("ftPdfChunk", 4, "yeast").await.expect("keyword")[0].index, 3);
}
