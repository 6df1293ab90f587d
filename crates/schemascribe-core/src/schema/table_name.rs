use std::fmt;
use std::str::FromStr;

use crate::error::{Result, ScribeError};

/// Default prefix stripped from table names to get the resource name the
/// text generator is asked about (`fhir_patient` → `patient`).
pub const DEFAULT_RESOURCE_PREFIX: &str = "fhir_";

/// A fully qualified `project.dataset.table` name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedTableName {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl QualifiedTableName {
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
        }
    }

    /// Parse a qualified name. Requires at least two `.` separators; the last
    /// segment is the table and the one before it the dataset, so project ids
    /// containing dots (`domain.com:proj`) keep working.
    pub fn parse(name: &str) -> Result<Self> {
        let invalid = || ScribeError::InvalidTableName {
            name: name.to_string(),
        };

        let trimmed = name.trim().trim_matches('`');
        if trimmed.matches('.').count() < 2 {
            return Err(invalid());
        }

        let (rest, table) = trimmed.rsplit_once('.').ok_or_else(invalid)?;
        let (project, dataset) = rest.rsplit_once('.').ok_or_else(invalid)?;

        if project.is_empty() || dataset.is_empty() || table.is_empty() {
            return Err(invalid());
        }

        Ok(Self::new(project, dataset, table))
    }

    /// Table name with `prefix` removed, used as the table-level context in
    /// prompts.
    pub fn resource_name(&self, prefix: &str) -> &str {
        if prefix.is_empty() {
            return &self.table;
        }
        self.table.strip_prefix(prefix).unwrap_or(&self.table)
    }

    /// Backtick-quoted form used in DDL.
    pub fn quoted(&self) -> String {
        format!("`{}`", self)
    }
}

impl fmt::Display for QualifiedTableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

impl FromStr for QualifiedTableName {
    type Err = ScribeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
