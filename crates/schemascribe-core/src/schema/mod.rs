pub mod chunk;
pub mod source;
pub mod table_name;
pub mod types;

pub use chunk::{chunk_schema, Chunk, DEFAULT_CHUNK_SIZE};
pub use source::{FileSchemaSource, SchemaSource};
pub use table_name::{QualifiedTableName, DEFAULT_RESOURCE_PREFIX};
pub use types::{Field, FieldMode, FieldType, TableSchema};
