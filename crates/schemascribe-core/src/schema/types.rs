use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, ScribeError};

/// Top-level representation of a warehouse table schema.
///
/// Serializes as a bare JSON array of fields, the same shape the warehouse
/// API returns, so schema files round-trip unchanged apart from the
/// descriptions the pipeline adds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableSchema {
    pub fields: Vec<Field>,
}

impl TableSchema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Parse a schema document. `location` is only used for error context.
    pub fn from_json(json: &str, location: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ScribeError::Format {
            location: location.to_string(),
            source: e,
        })
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ScribeError::Format {
            location: "<in-memory schema>".to_string(),
            source: e,
        })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Count of every field in the tree, nested ones included.
    pub fn field_count(&self) -> usize {
        fn count(fields: &[Field]) -> usize {
            fields.iter().map(|f| 1 + count(&f.fields)).sum()
        }
        count(&self.fields)
    }

    pub fn record_count(&self) -> usize {
        fn count(fields: &[Field]) -> usize {
            fields
                .iter()
                .map(|f| usize::from(f.is_record()) + count(&f.fields))
                .sum()
        }
        count(&self.fields)
    }

    /// Count of fields (at any depth) that carry a non-blank description.
    pub fn described_count(&self) -> usize {
        fn count(fields: &[Field]) -> usize {
            fields
                .iter()
                .map(|f| usize::from(f.has_description()) + count(&f.fields))
                .sum()
        }
        count(&self.fields)
    }
}

/// A single schema node. RECORD fields carry their children in `fields`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Missing names deserialize as empty so partially-enriched documents
    /// still load.
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub mode: FieldMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            mode: FieldMode::Nullable,
            description: None,
            fields: Vec::new(),
        }
    }

    pub fn record(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            fields,
            ..Self::new(name, FieldType::Record)
        }
    }

    pub fn with_mode(mut self, mode: FieldMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_record(&self) -> bool {
        self.field_type == FieldType::Record
    }

    pub fn is_repeated(&self) -> bool {
        self.mode == FieldMode::Repeated
    }

    pub fn has_description(&self) -> bool {
        self.description
            .as_deref()
            .is_some_and(|d| !d.trim().is_empty())
    }
}

/// Warehouse column type.
///
/// Unrecognized type names are kept verbatim in `Other` so that newer
/// warehouse types flow through to the DDL untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    #[default]
    String,
    Bytes,
    Integer,
    Float,
    Boolean,
    Timestamp,
    Date,
    Time,
    DateTime,
    Geography,
    Numeric,
    BigNumeric,
    /// Nested group of sub-fields (`RECORD` or `STRUCT`).
    Record,
    Other(String),
}

impl FieldType {
    /// Parse a raw type name. Matching is case-insensitive and accepts the
    /// standard-SQL aliases (`INT64`, `FLOAT64`, `BOOL`, `STRUCT`).
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "STRING" => FieldType::String,
            "BYTES" => FieldType::Bytes,
            "INTEGER" | "INT64" => FieldType::Integer,
            "FLOAT" | "FLOAT64" => FieldType::Float,
            "BOOLEAN" | "BOOL" => FieldType::Boolean,
            "TIMESTAMP" => FieldType::Timestamp,
            "DATE" => FieldType::Date,
            "TIME" => FieldType::Time,
            "DATETIME" => FieldType::DateTime,
            "GEOGRAPHY" => FieldType::Geography,
            "NUMERIC" => FieldType::Numeric,
            "BIGNUMERIC" => FieldType::BigNumeric,
            "RECORD" | "STRUCT" => FieldType::Record,
            _ => FieldType::Other(raw.to_string()),
        }
    }

    /// The schema-file spelling of this type.
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::String => "STRING",
            FieldType::Bytes => "BYTES",
            FieldType::Integer => "INTEGER",
            FieldType::Float => "FLOAT",
            FieldType::Boolean => "BOOLEAN",
            FieldType::Timestamp => "TIMESTAMP",
            FieldType::Date => "DATE",
            FieldType::Time => "TIME",
            FieldType::DateTime => "DATETIME",
            FieldType::Geography => "GEOGRAPHY",
            FieldType::Numeric => "NUMERIC",
            FieldType::BigNumeric => "BIGNUMERIC",
            FieldType::Record => "RECORD",
            FieldType::Other(raw) => raw,
        }
    }

    /// The DDL spelling of this type.
    pub fn ddl_name(&self) -> &str {
        match self {
            FieldType::Integer => "INT64",
            FieldType::Float => "FLOAT64",
            FieldType::Boolean => "BOOL",
            FieldType::Record => "STRUCT",
            other => other.as_str(),
        }
    }
}

impl From<String> for FieldType {
    fn from(raw: String) -> Self {
        FieldType::from_raw(&raw)
    }
}

impl From<FieldType> for String {
    fn from(field_type: FieldType) -> Self {
        field_type.as_str().to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column mode. Unknown spellings fall back to `Nullable`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldMode {
    #[default]
    Nullable,
    Required,
    Repeated,
}

impl FieldMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldMode::Nullable => "NULLABLE",
            FieldMode::Required => "REQUIRED",
            FieldMode::Repeated => "REPEATED",
        }
    }
}

impl From<String> for FieldMode {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "REQUIRED" => FieldMode::Required,
            "REPEATED" => FieldMode::Repeated,
            _ => FieldMode::Nullable,
        }
    }
}

impl From<FieldMode> for String {
    fn from(mode: FieldMode) -> Self {
        mode.as_str().to_string()
    }
}

impl fmt::Display for FieldMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
