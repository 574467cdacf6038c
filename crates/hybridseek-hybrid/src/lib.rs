//! Hybrid retrieval: index lifecycle, dual-mode query execution and
//! max-normalized fusion of vector and keyword results.

pub mod engine;
pub mod executor;
pub mod lifecycle;
pub mod merge;
pub mod store;

pub use engine::{HybridSearchEngine, SearchMode};
pub use executor::DualModeExecutor;
pub use lifecycle::IndexLifecycle;
pub use merge::{merge, normalize};
pub use store::{LocalChunkStore, StoreStatus};
