//! Load text, chunk it, embed the chunks and upsert them into the store.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;

use hybridseek_core::chunker::Chunker;
use hybridseek_core::config::Settings;
use hybridseek_core::traits::{ChunkStore, Embedder};
use hybridseek_core::types::{Chunk, TextChunk};
use hybridseek_hybrid::LocalChunkStore;
use hybridseek_vector::writer::hash_content;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub chunks: usize,
    pub unchanged: usize,
    pub written: usize,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IngestOptions {
    /// Number new chunks after the highest stored index instead of from 0.
    pub append: bool,
    pub show_progress: bool,
}

pub async fn ingest_path(
    store: &LocalChunkStore,
    embedder: Arc<dyn Embedder>,
    settings: &Settings,
    path: &Path,
    options: IngestOptions,
) -> Result<IngestReport> {
    let start = match options.append {
        true => store.max_index().await?.map_or(0, |m| m + 1),
        false => 0,
    };
    let mut chunker = Chunker::new(settings.chunking.clone()).starting_at(start);
    let chunks = chunker.chunk_path(path)?;
    let existing = store.content_hashes().await?;
    let (unchanged, pending): (Vec<TextChunk>, Vec<TextChunk>) = chunks
        .into_iter()
        .partition(|c| existing.get(&c.index).is_some_and(|h| *h == hash_content(&c.text)));
    tracing::info!(path = %path.display(), start, unchanged = unchanged.len(), pending = pending.len(), "chunked input");

    let pb = if options.show_progress { ProgressBar::new(pending.len() as u64) } else { ProgressBar::hidden() };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")?
            .progress_chars("#>-"),
    );

    let mut written = 0usize;
    for batch in pending.chunks(settings.embedding.batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let worker = embedder.clone();
        let embeddings = tokio::task::spawn_blocking(move || worker.embed_batch(&texts))
            .await
            .context("embedding task panicked")??;
        let rows: Vec<Chunk> = batch.iter().cloned().zip(embeddings).map(|(c, e)| Chunk::from_text(c, e)).collect();
        written += store.upsert_chunks(&rows).await?;
        pb.inc(batch.len() as u64);
    }
    pb.finish_with_message("done");

    Ok(IngestReport { chunks: unchanged.len() + pending.len(), unchanged: unchanged.len(), written })
}
