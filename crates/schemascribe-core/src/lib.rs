pub mod config;
pub mod ddl;
pub mod enrich;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod schema;
pub mod storage;
pub mod tracker;

// Re-export key types for convenience
pub use error::{Result, ScribeError};
pub use schema::types::{Field, FieldMode, FieldType, TableSchema};
