use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use tantivy::directory::error::LockError;
use tantivy::directory::MmapDirectory;
use tantivy::schema::Field;
use tantivy::{doc, Index, IndexWriter, TantivyError, Term};

use hybridseek_core::error::{Error, Result};
use hybridseek_core::types::{ChunkIndex, IndexDescriptor};

use crate::tantivy_utils::{build_schema, register_tokenizer, CHUNK_INDEX_FIELD};

const WRITER_HEAP_BYTES: usize = 50_000_000;
// Another process may hold the writer lock for the length of one commit.
const WRITER_LOCK_ATTEMPTS: u32 = 20;
const WRITER_LOCK_BACKOFF: Duration = Duration::from_millis(50);

/// One on-disk Tantivy index over chunk text, keyed by chunk index.
#[derive(Clone)]
pub struct FulltextIndex {
	pub(crate) index: Index,
	pub(crate) index_field: Field,
	pub(crate) text_field: Field,
	name: String,
}

impl FulltextIndex {
	/// Build a complete index from `rows` and move it into `dir`, replacing
	/// whatever was there.
	///
	/// The index is filled and committed in a private staging directory next
	/// to `dir`, so an interrupted build never leaves a half-filled index
	/// under the live name. When a concurrent build lands in `dir` first,
	/// that index is kept.
	pub fn rebuild<'a, I>(dir: &Path, descriptor: &IndexDescriptor, rows: I) -> Result<usize>
	where
		I: IntoIterator<Item = (ChunkIndex, &'a str)>,
	{
		let parent = dir
			.parent()
			.ok_or_else(|| Error::storage(format!("{} has no parent directory", dir.display())))?;
		std::fs::create_dir_all(parent).map_err(Error::storage)?;
		let staging = tempfile::Builder::new()
			.prefix(&format!(".{}-", descriptor.name))
			.tempdir_in(parent)
			.map_err(Error::storage)?;

		let written = {
			let index = Index::create_in_dir(staging.path(), build_schema(&descriptor.target_field))
				.map_err(Error::storage)?;
			Self::from_index(index, descriptor)?.upsert(rows)?
		};

		remove_dir_if_present(dir)?;
		match std::fs::rename(staging.path(), dir) {
			Ok(()) => tracing::info!(index = %descriptor.name, written, dir = %dir.display(), "built fulltext index"),
			Err(e) if dir.exists() => {
				tracing::debug!(index = %descriptor.name, error = %e, "concurrent build already in place")
			}
			Err(e) => return Err(Error::storage(e)),
		}
		Ok(written)
	}

	/// Open an existing index; `IndexMissing` when nothing is on disk. A live
	/// index whose schema lacks the descriptor's field is a configuration
	/// fault.
	pub fn open_existing(dir: &Path, descriptor: &IndexDescriptor) -> Result<Self> {
		if !dir.exists() {
			return Err(Error::IndexMissing(descriptor.name.clone()));
		}
		let directory = MmapDirectory::open(dir).map_err(Error::storage)?;
		if !Index::exists(&directory).map_err(Error::storage)? {
			return Err(Error::IndexMissing(descriptor.name.clone()));
		}
		let index = Index::open(directory).map_err(Error::storage)?;
		Self::from_index(index, descriptor)
	}

	fn from_index(index: Index, descriptor: &IndexDescriptor) -> Result<Self> {
		register_tokenizer(&index);
		let schema = index.schema();
		let index_field = schema
			.get_field(CHUNK_INDEX_FIELD)
			.map_err(|e| Error::configuration(descriptor, e.to_string()))?;
		let text_field = schema
			.get_field(&descriptor.target_field)
			.map_err(|e| Error::configuration(descriptor, e.to_string()))?;
		Ok(Self { index, index_field, text_field, name: descriptor.name.clone() })
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Replace-or-insert documents keyed by chunk index, then commit.
	pub fn upsert<'a, I>(&self, rows: I) -> Result<usize>
	where
		I: IntoIterator<Item = (ChunkIndex, &'a str)>,
	{
		let mut index_writer = self.writer()?;
		let mut written = 0usize;
		for (chunk_index, text) in rows {
			index_writer.delete_term(Term::from_field_u64(self.index_field, chunk_index));
			index_writer
				.add_document(doc!(self.index_field => chunk_index, self.text_field => text))
				.map_err(Error::storage)?;
			written += 1;
		}
		index_writer.commit().map_err(Error::storage)?;
		tracing::debug!(index = %self.name, written, "fulltext upsert committed");
		Ok(written)
	}

	fn writer(&self) -> Result<IndexWriter> {
		let mut attempt = 1;
		loop {
			match self.index.writer(WRITER_HEAP_BYTES) {
				Ok(writer) => return Ok(writer),
				Err(TantivyError::LockFailure(LockError::LockBusy, _)) if attempt < WRITER_LOCK_ATTEMPTS => {
					tracing::debug!(index = %self.name, attempt, "fulltext writer lock busy");
					std::thread::sleep(WRITER_LOCK_BACKOFF);
					attempt += 1;
				}
				Err(e) => return Err(Error::storage(e)),
			}
		}
	}

	pub fn num_docs(&self) -> Result<u64> {
		let reader = self.index.reader().map_err(Error::storage)?;
		Ok(reader.searcher().num_docs())
	}
}

/// Drop a directory tree, tolerating a concurrent removal.
fn remove_dir_if_present(dir: &Path) -> Result<()> {
	match std::fs::remove_dir_all(dir) {
		Ok(()) => Ok(()),
		Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
		Err(e) => Err(Error::storage(e)),
	}
}
