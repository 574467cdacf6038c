//! Domain types shared by the stores, the embedder and the hybrid engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Stable identity of a chunk. Assigned by the chunker, never reused.
pub type ChunkIndex = u64;

/// A slice of source text before it has been embedded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    pub index: ChunkIndex,
    pub text: String,
}

/// A chunk as persisted by the store.
///
/// - `index`: unique identity, dedup key for merged results
/// - `text`: the passage returned to callers
/// - `embedding`: vector of the process-wide dimension `D`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub index: ChunkIndex,
    pub text: String,
    pub embedding: Vec<f32>,
}

impl Chunk {
    pub fn from_text(chunk: TextChunk, embedding: Vec<f32>) -> Self {
        Self { index: chunk.index, text: chunk.text, embedding }
    }
}

/// Indicates which retrieval mode produced a hit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Vector,
    Keyword,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Vector => write!(f, "vector"),
            SourceKind::Keyword => write!(f, "keyword"),
        }
    }
}

/// A raw hit from one retrieval mode.
///
/// `raw_score` is on the mode's own scale (bounded similarity for vectors,
/// unbounded BM25 for keywords). Higher is always better. Scores from
/// different sources are not comparable until normalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredHit {
    pub index: ChunkIndex,
    pub text: String,
    pub raw_score: f32,
    pub source: SourceKind,
}

/// A hit after per-mode max normalization, `score` in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedHit {
    pub index: ChunkIndex,
    pub text: String,
    pub score: f32,
}

/// One hybrid retrieval request.
#[derive(Debug, Clone)]
pub struct Query {
    pub question: String,
    pub embedding: Vec<f32>,
    pub k: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Vector,
    Fulltext,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKind::Vector => write!(f, "vector"),
            IndexKind::Fulltext => write!(f, "fulltext"),
        }
    }
}

/// Similarity function of a vector index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Similarity {
    #[default]
    Cosine,
    Euclidean,
    Dot,
}

impl fmt::Display for Similarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Similarity::Cosine => write!(f, "cosine"),
            Similarity::Euclidean => write!(f, "euclidean"),
            Similarity::Dot => write!(f, "dot"),
        }
    }
}

impl FromStr for Similarity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(Similarity::Cosine),
            "euclidean" | "l2" => Ok(Similarity::Euclidean),
            "dot" | "dot_product" => Ok(Similarity::Dot),
            other => Err(Error::InvalidConfig(format!("unknown similarity function '{other}'"))),
        }
    }
}

/// Expected configuration of one index, compared against the live catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub name: String,
    pub kind: IndexKind,
    pub target_field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<Similarity>,
}

impl IndexDescriptor {
    pub fn vector(name: impl Into<String>, target_field: impl Into<String>, dimensions: usize, similarity: Similarity) -> Self {
        Self {
            name: name.into(),
            kind: IndexKind::Vector,
            target_field: target_field.into(),
            dimensions: Some(dimensions),
            similarity: Some(similarity),
        }
    }

    pub fn fulltext(name: impl Into<String>, target_field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: IndexKind::Fulltext,
            target_field: target_field.into(),
            dimensions: None,
            similarity: None,
        }
    }
}

impl fmt::Display for IndexDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} index '{}' on '{}'", self.kind, self.name, self.target_field)?;
        if let Some(d) = self.dimensions {
            write!(f, " dimensions={d}")?;
        }
        if let Some(s) = self.similarity {
            write!(f, " similarity={s}")?;
        }
        Ok(())
    }
}
