//! Local [`ChunkStore`]: LanceDB for chunk rows, vectors and the index
//! catalog, Tantivy for full-text indexes.
//!
//! Layout under the store root:
//!
//! - `lancedb/` holds the chunk table and the `meta` catalog table
//! - `fulltext/<index name>/` holds one Tantivy index per fulltext descriptor
//!
//! The catalog decides whether an index exists. Physical structures that
//! went missing behind a catalog entry are rebuilt on the next
//! `create_index`, which is how a search recovers from a deleted directory.
//! An upsert that finds a fulltext directory gone rebuilds it as well.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use hybridseek_core::config::Settings;
use hybridseek_core::error::{Error, Result};
use hybridseek_core::traits::ChunkStore;
use hybridseek_core::types::{Chunk, ChunkIndex, IndexDescriptor, IndexKind, ScoredHit};
use hybridseek_text::FulltextIndex;
use hybridseek_vector::{open_db, AnnOutcome, ChunkTable, IndexCatalog};

const LANCEDB_DIR: &str = "lancedb";
const FULLTEXT_DIR: &str = "fulltext";

/// Row and index counts reported by `status`.
#[derive(Debug, Clone)]
pub struct StoreStatus {
    pub root: PathBuf,
    pub rows: usize,
    pub dimensions: Option<usize>,
    pub indexes: Vec<(IndexDescriptor, Option<u64>)>,
}

pub struct LocalChunkStore {
    root: PathBuf,
    chunks: ChunkTable,
    catalog: IndexCatalog,
    // Serializes catalog mutation and index writers.
    write_lock: Mutex<()>,
}

impl LocalChunkStore {
    pub async fn open(root: &Path, table: &str, vector_field: &str) -> Result<Self> {
        let lance_dir = root.join(LANCEDB_DIR);
        std::fs::create_dir_all(&lance_dir).map_err(Error::storage)?;
        let db = open_db(&lance_dir.to_string_lossy()).await?;
        tracing::debug!(root = %root.display(), table, "opened local chunk store");
        Ok(Self {
            root: root.to_path_buf(),
            chunks: ChunkTable::new(db.clone(), table, vector_field),
            catalog: IndexCatalog::new(db),
            write_lock: Mutex::new(()),
        })
    }

    /// Open the store configured in `settings`, resolving a relative root
    /// against `base`.
    pub async fn from_settings(settings: &Settings, base: &Path) -> Result<Self> {
        Self::open(&settings.store.root_path(base), &settings.store.table, &settings.retrieval.vector_field).await
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn fulltext_dir(&self, name: &str) -> PathBuf {
        self.root.join(FULLTEXT_DIR).join(name)
    }

    async fn descriptor(&self, name: &str, kind: IndexKind) -> Result<IndexDescriptor> {
        let descriptor = self.catalog.get(name).await?.ok_or_else(|| Error::IndexMissing(name.to_string()))?;
        if descriptor.kind != kind {
            return Err(Error::configuration(&descriptor, format!("expected a {kind} index")));
        }
        Ok(descriptor)
    }

    /// Bring the physical structure behind `descriptor` in line with it.
    /// `fresh` means the catalog has no entry yet, so anything already on
    /// disk under that name is left over from an interrupted create and is
    /// rebuilt from the chunk table.
    async fn materialize(&self, descriptor: &IndexDescriptor, fresh: bool) -> Result<()> {
        match descriptor.kind {
            IndexKind::Vector => {
                if descriptor.target_field != self.chunks.vector_field() {
                    return Err(Error::configuration(
                        descriptor,
                        format!("chunk table stores vectors in '{}'", self.chunks.vector_field()),
                    ));
                }
                let dims = descriptor
                    .dimensions
                    .ok_or_else(|| Error::configuration(descriptor, "vector index without dimensions"))?;
                self.chunks.ensure(dims).await
            }
            IndexKind::Fulltext => {
                if !fresh {
                    match FulltextIndex::open_existing(&self.fulltext_dir(&descriptor.name), descriptor) {
                        Ok(_) => return Ok(()),
                        Err(Error::IndexMissing(_)) => {
                            tracing::warn!(index = %descriptor.name, "fulltext index missing on disk, rebuilding")
                        }
                        Err(e) => return Err(e),
                    }
                }
                self.rebuild_fulltext(descriptor).await.map(|_| ())
            }
        }
    }

    /// Rebuild a fulltext index from every row of the chunk table.
    async fn rebuild_fulltext(&self, descriptor: &IndexDescriptor) -> Result<usize> {
        let rows = self.chunks.scan_text().await?;
        let dir = self.fulltext_dir(&descriptor.name);
        let target = descriptor.clone();
        let written = tokio::task::spawn_blocking(move || {
            FulltextIndex::rebuild(&dir, &target, rows.iter().map(|(i, t)| (*i, t.as_str())))
        })
        .await
        .map_err(Error::storage)??;
        tracing::info!(index = %descriptor.name, written, "backfilled fulltext index from chunk table");
        Ok(written)
    }

    pub async fn status(&self) -> Result<StoreStatus> {
        let mut indexes = Vec::new();
        for descriptor in self.catalog.list().await? {
            let docs = match descriptor.kind {
                IndexKind::Fulltext => {
                    match FulltextIndex::open_existing(&self.fulltext_dir(&descriptor.name), &descriptor)
                        .and_then(|i| i.num_docs())
                    {
                        Ok(docs) => Some(docs),
                        Err(e) => {
                            tracing::warn!(index = %descriptor.name, error = %e, "cannot count fulltext documents");
                            None
                        }
                    }
                }
                IndexKind::Vector => None,
            };
            indexes.push((descriptor, docs));
        }
        Ok(StoreStatus {
            root: self.root.clone(),
            rows: self.chunks.count().await?,
            dimensions: self.chunks.dimensions().await?,
            indexes,
        })
    }

    pub async fn content_hashes(&self) -> Result<std::collections::HashMap<ChunkIndex, String>> {
        self.chunks.content_hashes().await
    }

    pub async fn max_index(&self) -> Result<Option<ChunkIndex>> {
        self.chunks.max_index().await
    }

    /// Train the ANN index for a cataloged vector index and compact the table.
    pub async fn optimize(&self, vector_index: &str) -> Result<AnnOutcome> {
        let descriptor = self.descriptor(vector_index, IndexKind::Vector).await?;
        let _guard = self.write_lock.lock().await;
        let outcome = self.chunks.build_ann_index(&descriptor).await?;
        self.chunks.optimize().await?;
        Ok(outcome)
    }
}

#[async_trait]
impl ChunkStore for LocalChunkStore {
    async fn create_index(&self, descriptor: &IndexDescriptor) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        match self.catalog.get(&descriptor.name).await? {
            Some(existing) if existing != *descriptor => {
                return Err(Error::configuration(descriptor, format!("catalog already holds {existing}")));
            }
            Some(_) => self.materialize(descriptor, false).await,
            None => {
                self.materialize(descriptor, true).await?;
                if let Err(e) = self.catalog.put(descriptor).await {
                    // Another handle on the same root may have committed the entry first
                    match self.catalog.get(&descriptor.name).await? {
                        Some(existing) if existing == *descriptor => {
                            tracing::debug!(index = %descriptor.name, "catalog entry written concurrently")
                        }
                        _ => return Err(e),
                    }
                }
                tracing::info!(index = %descriptor.name, "created {descriptor}");
                Ok(())
            }
        }
    }

    async fn vector_query(&self, index_name: &str, k: usize, embedding: &[f32]) -> Result<Vec<ScoredHit>> {
        let descriptor = self.descriptor(index_name, IndexKind::Vector).await?;
        if descriptor.dimensions != Some(embedding.len()) {
            return Err(Error::configuration(
                &descriptor,
                format!("query embedding has {} dimensions", embedding.len()),
            ));
        }
        self.chunks.vector_search(&descriptor, k, embedding).await
    }

    async fn keyword_query(&self, index_name: &str, k: usize, question: &str) -> Result<Vec<ScoredHit>> {
        let descriptor = self.descriptor(index_name, IndexKind::Fulltext).await?;
        let index = FulltextIndex::open_existing(&self.fulltext_dir(index_name), &descriptor)?;
        let question = question.to_string();
        tokio::task::spawn_blocking(move || index.search(&question, k))
            .await
            .map_err(Error::storage)?
    }

    async fn upsert_chunks(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let _guard = self.write_lock.lock().await;
        let descriptors = self.catalog.list().await?;
        let first = &chunks[0];
        for d in descriptors.iter().filter(|d| d.kind == IndexKind::Vector) {
            if d.dimensions != Some(first.embedding.len()) {
                return Err(Error::configuration(
                    d,
                    format!("chunk {} has {} dimensions", first.index, first.embedding.len()),
                ));
            }
        }
        // Fulltext before the chunk table: re-ingest skips any row whose
        // content hash is already in the chunk table.
        let rows: Vec<(ChunkIndex, String)> = chunks.iter().map(|c| (c.index, c.text.clone())).collect();
        let mut missing = Vec::new();
        for d in descriptors.iter().filter(|d| d.kind == IndexKind::Fulltext) {
            match FulltextIndex::open_existing(&self.fulltext_dir(&d.name), d) {
                Ok(index) => {
                    write_fulltext(index, rows.clone()).await?;
                }
                Err(Error::IndexMissing(_)) => missing.push(d),
                Err(e) => return Err(e),
            }
        }
        let written = self.chunks.upsert(chunks).await?;
        for d in missing {
            tracing::warn!(index = %d.name, "fulltext index missing on disk, rebuilding");
            self.rebuild_fulltext(d).await?;
        }
        tracing::info!(written, "upserted chunks");
        Ok(written)
    }
}

async fn write_fulltext(index: FulltextIndex, rows: Vec<(ChunkIndex, String)>) -> Result<usize> {
    tokio::task::spawn_blocking(move || index.upsert(rows.iter().map(|(i, t)| (*i, t.as_str()))))
        .await
        .map_err(Error::storage)?
}
