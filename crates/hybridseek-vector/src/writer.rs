use arrow_array::{FixedSizeListArray, RecordBatch, RecordBatchIterator, StringArray, UInt64Array};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{Connection, Table};
use std::collections::HashMap;
use std::sync::Arc;

use hybridseek_core::error::{Error, Result};
use hybridseek_core::types::{Chunk, ChunkIndex};

use crate::schema::{build_chunk_schema, vector_dimensions, CHUNK_INDEX_COLUMN, CONTENT_HASH_COLUMN, TEXT_COLUMN};
use crate::table::{ensure_table, table_exists};

const BATCH_SIZE: usize = 1000;

pub fn hash_content(s: &str) -> String {
	blake3::hash(s.as_bytes()).to_hex().to_string()
}

/// The LanceDB table holding chunk rows and their embeddings.
#[derive(Clone)]
pub struct ChunkTable {
	pub(crate) db: Connection,
	pub(crate) table_name: String,
	pub(crate) vector_field: String,
}

impl ChunkTable {
	pub fn new(db: Connection, table_name: &str, vector_field: &str) -> Self {
		Self { db, table_name: table_name.to_string(), vector_field: vector_field.to_string() }
	}

	pub fn name(&self) -> &str {
		&self.table_name
	}

	pub fn vector_field(&self) -> &str {
		&self.vector_field
	}

	pub async fn exists(&self) -> Result<bool> {
		table_exists(&self.db, &self.table_name).await
	}

	pub(crate) async fn open(&self) -> Result<Table> {
		self.db.open_table(&self.table_name).execute().await.map_err(Error::storage)
	}

	/// Width of the stored vector column; `None` before the table exists.
	pub async fn dimensions(&self) -> Result<Option<usize>> {
		if !self.exists().await? {
			return Ok(None);
		}
		let schema = self.open().await?.schema().await.map_err(Error::storage)?;
		match vector_dimensions(&schema, &self.vector_field) {
			Some(n) => Ok(Some(n as usize)),
			None => Err(Error::configuration(
				format!("table '{}'", self.table_name),
				format!("no fixed-size vector column named '{}'", self.vector_field),
			)),
		}
	}

	/// Create the table for `dimensions`-wide vectors, or verify that the
	/// existing table uses that width.
	pub async fn ensure(&self, dimensions: usize) -> Result<()> {
		let created = ensure_table(&self.db, &self.table_name, build_chunk_schema(&self.vector_field, dimensions as i32)).await?;
		if created {
			tracing::info!(table = %self.table_name, dimensions, "created chunk table");
			return Ok(());
		}
		match self.dimensions().await? {
			Some(existing) if existing != dimensions => Err(Error::configuration(
				format!("table '{}'", self.table_name),
				format!("stored vectors have {existing} dimensions, expected {dimensions}"),
			)),
			_ => Ok(()),
		}
	}

	pub async fn count(&self) -> Result<usize> {
		if !self.exists().await? {
			return Ok(0);
		}
		self.open().await?.count_rows(None).await.map_err(Error::storage)
	}

	/// Insert or replace rows keyed by chunk index.
	pub async fn upsert(&self, chunks: &[Chunk]) -> Result<usize> {
		let Some(first) = chunks.first() else { return Ok(0) };
		let dimensions = first.embedding.len();
		if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != dimensions) {
			return Err(Error::configuration(
				format!("table '{}'", self.table_name),
				format!("chunk {} has {} dimensions, batch has {}", bad.index, bad.embedding.len(), dimensions),
			));
		}
		self.ensure(dimensions).await?;
		let table = self.open().await?;
		let mut written = 0usize;
		for batch in chunks.chunks(BATCH_SIZE) {
			let record_batch = self.chunks_to_record_batch(batch, dimensions as i32)?;
			let schema = record_batch.schema();
			let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
			let mut mi = table.merge_insert(&[CHUNK_INDEX_COLUMN]);
			mi.when_matched_update_all(None).when_not_matched_insert_all();
			mi.execute(reader).await.map_err(Error::storage)?;
			written += batch.len();
		}
		tracing::debug!(table = %self.table_name, written, "chunk upsert committed");
		Ok(written)
	}

	fn chunks_to_record_batch(&self, chunks: &[Chunk], dimensions: i32) -> Result<RecordBatch> {
		let schema = build_chunk_schema(&self.vector_field, dimensions);
		let mut indices = Vec::with_capacity(chunks.len());
		let mut texts = Vec::with_capacity(chunks.len());
		let mut hashes = Vec::with_capacity(chunks.len());
		let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(chunks.len());
		for c in chunks {
			indices.push(c.index);
			texts.push(c.text.clone());
			hashes.push(hash_content(&c.text));
			vectors.push(Some(c.embedding.iter().map(|&x| Some(x)).collect()));
		}
		RecordBatch::try_new(schema, vec![
			Arc::new(UInt64Array::from(indices)),
			Arc::new(StringArray::from(texts)),
			Arc::new(StringArray::from(hashes)),
			Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), dimensions)),
		])
		.map_err(Error::storage)
	}

	/// `(chunk_index, text)` for every row, in no particular order.
	pub async fn scan_text(&self) -> Result<Vec<(ChunkIndex, String)>> {
		let mut out = Vec::new();
		self.scan(&[CHUNK_INDEX_COLUMN, TEXT_COLUMN], |batch, i| {
			let idx = column::<UInt64Array>(batch, CHUNK_INDEX_COLUMN)?.value(i);
			let text = column::<StringArray>(batch, TEXT_COLUMN)?.value(i).to_string();
			out.push((idx, text));
			Ok(())
		})
		.await?;
		Ok(out)
	}

	/// Stored content hash per chunk index.
	pub async fn content_hashes(&self) -> Result<HashMap<ChunkIndex, String>> {
		let mut out = HashMap::new();
		self.scan(&[CHUNK_INDEX_COLUMN, CONTENT_HASH_COLUMN], |batch, i| {
			let idx = column::<UInt64Array>(batch, CHUNK_INDEX_COLUMN)?.value(i);
			let hash = column::<StringArray>(batch, CONTENT_HASH_COLUMN)?.value(i).to_string();
			out.insert(idx, hash);
			Ok(())
		})
		.await?;
		Ok(out)
	}

	pub async fn max_index(&self) -> Result<Option<ChunkIndex>> {
		let mut max: Option<ChunkIndex> = None;
		self.scan(&[CHUNK_INDEX_COLUMN], |batch, i| {
			let idx = column::<UInt64Array>(batch, CHUNK_INDEX_COLUMN)?.value(i);
			max = Some(max.map_or(idx, |m| m.max(idx)));
			Ok(())
		})
		.await?;
		Ok(max)
	}

	async fn scan<F>(&self, columns: &[&str], mut f: F) -> Result<()>
	where
		F: FnMut(&RecordBatch, usize) -> Result<()>,
	{
		if !self.exists().await? {
			return Ok(());
		}
		let table = self.open().await?;
		let mut stream = table.query().select(Select::columns(columns)).execute().await.map_err(Error::storage)?;
		while let Some(batch) = stream.try_next().await.map_err(Error::storage)? {
			for i in 0..batch.num_rows() {
				f(&batch, i)?;
			}
		}
		Ok(())
	}
}

pub(crate) fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<T>())
		.ok_or_else(|| Error::storage(format!("column '{name}' missing or mistyped")))
}
