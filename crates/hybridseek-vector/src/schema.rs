use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

pub const CHUNK_INDEX_COLUMN: &str = "chunk_index";
pub const TEXT_COLUMN: &str = "text";
pub const CONTENT_HASH_COLUMN: &str = "content_hash";

/// Row layout of the chunk table. The vector column is named after the
/// vector index's target field so one table can serve the configured index.
pub fn build_chunk_schema(vector_field: &str, dimensions: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new(CHUNK_INDEX_COLUMN, DataType::UInt64, false),
		Field::new(TEXT_COLUMN, DataType::Utf8, false),
		Field::new(CONTENT_HASH_COLUMN, DataType::Utf8, false),
		Field::new(vector_field, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dimensions), true),
	]))
}

pub fn build_meta_schema() -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("key", DataType::Utf8, false),
		Field::new("value", DataType::Utf8, false),
		Field::new("updated_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
	]))
}

/// Fixed list width of `vector_field`, if the schema has such a column.
pub fn vector_dimensions(schema: &Schema, vector_field: &str) -> Option<i32> {
	match schema.field_with_name(vector_field).ok()?.data_type() {
		DataType::FixedSizeList(_, n) => Some(*n),
		_ => None,
	}
}
