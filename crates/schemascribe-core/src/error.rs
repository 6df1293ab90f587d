//! # Error Types
//!
//! Defines `ScribeError`, the unified error enum for every failure mode in
//! the SchemaScribe pipeline. Variants fall into four families:
//!
//! - **configuration** (`Config`, `InvalidMode`, `InvalidTableName`,
//!   `UnsupportedLocation`): fatal for the current table or run
//! - **backend** (`Llm`): recoverable; one chunk or one table description
//!   goes without generated text
//! - **format** (`Format`): the table is skipped, a batch moves on
//! - **storage** (`Storage`): fatal for the current table
//!
//! Every variant carries enough context (table, location, offending value)
//! to debug without digging through logs.

use thiserror::Error;

/// All errors that can occur in SchemaScribe operations.
#[derive(Error, Debug)]
pub enum ScribeError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid DDL mode '{mode}'. Expected 'create' or 'alter'")]
    InvalidMode { mode: String },

    #[error("Invalid table name format '{name}'. Expected 'project.dataset.table_name'")]
    InvalidTableName { name: String },

    #[error("Unsupported storage location '{location}'. Supported: local paths and file:// URIs")]
    UnsupportedLocation { location: String },

    #[error("LLM API error: {message}")]
    Llm { message: String },

    #[error("Malformed schema JSON in {location}: {source}")]
    Format {
        location: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Storage error: {message}: {source}")]
    Storage {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

impl ScribeError {
    /// Backend and format failures are expected during normal operation;
    /// everything else points at configuration or storage.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ScribeError::Llm { .. } | ScribeError::Format { .. })
    }

    pub(crate) fn storage(message: impl Into<String>, source: std::io::Error) -> Self {
        ScribeError::Storage {
            message: message.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScribeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_mode_names_value() {
        let err = ScribeError::InvalidMode {
            mode: "upsert".to_string(),
        };
        assert!(err.to_string().contains("'upsert'"));
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(ScribeError::Llm {
            message: "timeout".to_string()
        }
        .is_recoverable());
        assert!(!ScribeError::InvalidTableName {
            name: "patients".to_string()
        }
        .is_recoverable());
        assert!(!ScribeError::storage(
            "write failed",
            std::io::Error::other("disk full")
        )
        .is_recoverable());
    }
}
