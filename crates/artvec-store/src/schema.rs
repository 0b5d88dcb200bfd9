use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

pub fn objects_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("original_id", DataType::Utf8, false),
        Field::new("image_url", DataType::Utf8, false),
        Field::new("long_title", DataType::Utf8, false),
        Field::new("artist", DataType::Utf8, false),
    ]))
}

/// One row per embedded object; `art_object_id` is unique (writes are upserts).
pub fn embeddings_schema(dim: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("art_object_id", DataType::Int64, false),
        Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
        Field::new("embedded_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
    ]))
}

/// Width of the `vector` column, if the schema has one.
pub fn vector_dim(schema: &Schema) -> Option<i32> {
    match schema.field_with_name("vector").ok()?.data_type() {
        DataType::FixedSizeList(_, dim) => Some(*dim),
        _ => None,
    }
}
