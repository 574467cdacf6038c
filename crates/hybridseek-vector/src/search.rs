use arrow_array::{Float32Array, StringArray, UInt64Array};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::DistanceType;

use hybridseek_core::error::{Error, Result};
use hybridseek_core::types::{IndexDescriptor, ScoredHit, Similarity, SourceKind};

use crate::schema::{CHUNK_INDEX_COLUMN, TEXT_COLUMN};
use crate::writer::{column, ChunkTable};

const DISTANCE_COLUMN: &str = "_distance";

pub fn distance_type(similarity: Similarity) -> DistanceType {
	match similarity {
		Similarity::Cosine => DistanceType::Cosine,
		Similarity::Euclidean => DistanceType::L2,
		Similarity::Dot => DistanceType::Dot,
	}
}

/// Map a LanceDB distance onto a similarity where larger is better.
///
/// Cosine and dot distances are `1 - cos` in `[0, 2]`, so `1 - d/2` lands in
/// `[0, 1]`. Euclidean distances become `1 / (1 + d)`.
pub fn similarity_score(similarity: Similarity, distance: f32) -> f32 {
	match similarity {
		Similarity::Cosine | Similarity::Dot => 1.0 - distance / 2.0,
		Similarity::Euclidean => 1.0 / (1.0 + distance.max(0.0)),
	}
}

impl ChunkTable {
	/// Nearest-neighbour top-k under the descriptor's similarity, best first.
	pub async fn vector_search(&self, descriptor: &IndexDescriptor, k: usize, query: &[f32]) -> Result<Vec<ScoredHit>> {
		let Some(stored) = self.dimensions().await? else {
			return Err(Error::IndexMissing(descriptor.name.clone()));
		};
		if query.len() != stored {
			return Err(Error::configuration(
				descriptor,
				format!("query embedding has {} dimensions, index stores {}", query.len(), stored),
			));
		}
		if k == 0 || self.count().await? == 0 {
			return Ok(vec![]);
		}
		let similarity = descriptor.similarity.unwrap_or_default();
		let table = self.open().await?;
		let mut stream = table
			.vector_search(query.to_vec())
			.map_err(Error::storage)?
			.column(&self.vector_field)
			.distance_type(distance_type(similarity))
			.limit(k)
			.execute()
			.await
			.map_err(Error::storage)?;

		let mut hits = Vec::with_capacity(k);
		while let Some(batch) = stream.try_next().await.map_err(Error::storage)? {
			let indices = column::<UInt64Array>(&batch, CHUNK_INDEX_COLUMN)?;
			let texts = column::<StringArray>(&batch, TEXT_COLUMN)?;
			let distances = column::<Float32Array>(&batch, DISTANCE_COLUMN)?;
			for i in 0..batch.num_rows() {
				hits.push(ScoredHit {
					index: indices.value(i),
					text: texts.value(i).to_string(),
					raw_score: similarity_score(similarity, distances.value(i)),
					source: SourceKind::Vector,
				});
			}
		}
		hits.sort_by(|a, b| b.raw_score.total_cmp(&a.raw_score).then(a.index.cmp(&b.index)));
		hits.truncate(k);
		Ok(hits)
	}
}
