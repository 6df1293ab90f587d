//! # Enrichment Executor
//!
//! Fills a schema with generated descriptions:
//!
//! 1. **Chunk** the top-level fields (RECORDs travel whole)
//! 2. **Dispatch** each chunk's prompt to the generator, at most
//!    `max_concurrency` calls in flight
//! 3. **Parse** each response; a backend error or unparsable response only
//!    costs that chunk its descriptions
//! 4. **Merge** results by chunk index onto a copy of the input, so the
//!    output order never depends on which call returned first

pub mod executor;
pub mod merge;

pub use executor::{
    ChunkFailure, EnrichedSchema, Enricher, EnrichmentReport, EnrichmentStrategy, PromptContext,
    DEFAULT_MAX_CONCURRENCY, MAX_DESCRIPTION_LENGTH,
};
