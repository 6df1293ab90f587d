//! # Schema Chunker
//!
//! Splits the top-level field list into bounded work units for the text
//! generator. Only the top level is walked: a RECORD field travels whole,
//! with its entire subtree, and counts as a single unit against the budget.
//! Splitting a RECORD across two generator calls would leave each call
//! without the context of its sibling sub-fields.

use serde::Serialize;

use super::types::{Field, TableSchema};

/// Default number of top-level fields per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 15;

/// A contiguous run of top-level fields, tagged with its position in the
/// chunk sequence so results can be reassembled in schema order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub index: usize,
    pub fields: Vec<Field>,
}

impl Chunk {
    /// Number of budget units this chunk consumes (one per top-level field).
    pub fn units(&self) -> usize {
        self.fields.len()
    }

    /// Pretty JSON of the chunk's fields, as embedded in prompts.
    pub fn to_prompt_json(&self) -> String {
        // Serializing plain strings and enums into a Value cannot fail.
        serde_json::to_string_pretty(&self.fields).unwrap_or_else(|_| "[]".to_string())
    }
}

/// Partition `schema` into chunks of at most `max_size` top-level fields.
///
/// A `max_size` of zero is treated as one. An empty schema yields no chunks;
/// otherwise every chunk is non-empty and the final partial chunk is kept.
pub fn chunk_schema(schema: &TableSchema, max_size: usize) -> Vec<Chunk> {
    let max_size = max_size.max(1);

    let mut chunks = Vec::new();
    let mut current: Vec<Field> = Vec::new();

    for field in &schema.fields {
        if current.len() + 1 > max_size {
            chunks.push(Chunk {
                index: chunks.len(),
                fields: std::mem::take(&mut current),
            });
        }
        current.push(field.clone());
    }

    if !current.is_empty() {
        chunks.push(Chunk {
            index: chunks.len(),
            fields: current,
        });
    }

    chunks
}
