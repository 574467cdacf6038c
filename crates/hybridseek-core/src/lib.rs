//! hybridseek-core
//!
//! Shared domain types, the error taxonomy, collaborator traits, configuration
//! and the text chunker used by every other crate in the workspace.

pub mod chunker;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
