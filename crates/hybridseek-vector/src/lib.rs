//! LanceDB-backed storage: the chunk table with its vector column, and the
//! `meta` table that records which indexes have been defined.

pub mod catalog;
pub mod index_build;
pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub use catalog::IndexCatalog;
pub use index_build::{compute_ivfpq_params, AnnOutcome, IvfPqParams};
pub use search::similarity_score;
pub use table::open_db;
pub use writer::ChunkTable;
