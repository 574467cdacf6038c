//! ANN index build for the chunk table.
//!
//! Small tables are served by a flat scan; once a table reaches
//! [`MIN_ROWS_FOR_ANN`] rows an IVF_PQ index can be trained over the vector
//! column. Parameters are derived from the row count and dimension.

use lancedb::index::vector::IvfPqIndexBuilder;
use lancedb::index::Index;
use lancedb::table::OptimizeAction;

use hybridseek_core::error::{Error, Result};
use hybridseek_core::types::IndexDescriptor;

use crate::search::distance_type;
use crate::writer::ChunkTable;

/// PQ training needs at least 256 rows for 8-bit codebooks.
pub const MIN_ROWS_FOR_ANN: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IvfPqParams {
    pub nlist: usize,
    pub m: usize,
    pub nbits: usize,
}

pub fn compute_ivfpq_params(total_rows: usize, dim: usize) -> IvfPqParams {
    let sqrt_n = (total_rows as f64).sqrt() as usize;
    let nlist = sqrt_n.clamp(1, 65536);
    // Sub-vector count must divide the dimension
    let m = [32, 16, 8, 4, 2, 1].into_iter().find(|m| dim % m == 0 && *m <= dim).unwrap_or(1);
    IvfPqParams { nlist, m, nbits: 8 }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnOutcome {
    Built(IvfPqParams),
    /// Too few rows; queries keep using a flat scan.
    Skipped { rows: usize },
}

impl ChunkTable {
    /// Train an IVF_PQ index named after the descriptor, replacing any
    /// previous one.
    pub async fn build_ann_index(&self, descriptor: &IndexDescriptor) -> Result<AnnOutcome> {
        let rows = self.count().await?;
        if rows < MIN_ROWS_FOR_ANN {
            tracing::info!(index = %descriptor.name, rows, "too few rows for an ANN index, keeping flat scan");
            return Ok(AnnOutcome::Skipped { rows });
        }
        let Some(dim) = self.dimensions().await? else {
            return Err(Error::IndexMissing(descriptor.name.clone()));
        };
        let params = compute_ivfpq_params(rows, dim);
        let similarity = descriptor.similarity.unwrap_or_default();
        let table = self.open().await?;
        table
            .create_index(
                &[self.vector_field.as_str()],
                Index::IvfPq(
                    IvfPqIndexBuilder::default()
                        .distance_type(distance_type(similarity))
                        .num_partitions(params.nlist as u32)
                        .num_sub_vectors(params.m as u32),
                ),
            )
            .name(descriptor.name.clone())
            .replace(true)
            .execute()
            .await
            .map_err(Error::storage)?;
        tracing::info!(index = %descriptor.name, rows, nlist = params.nlist, m = params.m, "built IVF_PQ index");
        Ok(AnnOutcome::Built(params))
    }

    /// Compact fragments and prune old versions.
    pub async fn optimize(&self) -> Result<()> {
        if !self.exists().await? {
            return Ok(());
        }
        self.open().await?.optimize(OptimizeAction::All).await.map_err(Error::storage)?;
        Ok(())
    }
}
