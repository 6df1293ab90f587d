//! Text generation: the `TextGenerator` seam, the HTTP client behind it, an
//! on-disk response cache, prompt templates and response parsing.

pub mod cache;
pub mod client;
pub mod parse;
pub mod prompt;

pub use cache::CachingGenerator;
pub use client::{LlmProvider, TextGenerator};
pub use parse::{FieldDescription, ParsedChunk};
pub use prompt::PromptTemplates;
