//! hybridseek-text
//!
//! Tantivy-backed full-text indexes over chunk text. Each index lives in its
//! own directory and is addressed by the name in its `IndexDescriptor`.

pub mod tantivy_utils;
pub mod index;
pub mod search;

pub use index::FulltextIndex;
