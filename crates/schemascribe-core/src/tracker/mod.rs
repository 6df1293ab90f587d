//! # Batch Tracker
//!
//! An append-only progress log that makes a multi-table batch resumable.
//! Each completed table appends one NDJSON line:
//!
//! ```text
//! {"table_name":"fhir_patient","processed_at":"2025-06-15T12:00:00.000Z"}
//! ```
//!
//! The controller checks `has_processed` before a table and calls
//! `mark_processed` only after that table's DDL has been written, so a crash
//! in between reprocesses at most one table and never skips one. The log is
//! deleted with `clear` once every table in the batch is marked.
//!
//! Malformed lines are skipped on read. Concurrent batch runs against the
//! same tracker location are not supported.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScribeError};
use crate::storage::BlobStore;

/// Default tracker object name, placed in the batch output directory.
pub const TRACKER_FILE_NAME: &str = ".schemascribe-tracker.ndjson";

/// One completed table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerEntry {
    pub table_name: String,
    /// ISO 8601 UTC timestamp. Kept as written so that entries produced by
    /// other tools still count toward completion even if the timestamp does
    /// not parse.
    #[serde(default)]
    pub processed_at: String,
}

impl TrackerEntry {
    pub fn now(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            processed_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    pub fn processed_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.processed_at)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Resumable progress record for one batch run.
pub struct BatchTracker {
    store: Arc<dyn BlobStore>,
    location: String,
}

impl BatchTracker {
    pub fn new(store: Arc<dyn BlobStore>, location: impl Into<String>) -> Self {
        Self {
            store,
            location: location.into(),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// All well-formed entries in log order.
    pub fn entries(&self) -> Result<Vec<TrackerEntry>> {
        let Some(content) = self.store.read(&self.location)? else {
            return Ok(Vec::new());
        };

        let mut entries = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<TrackerEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::debug!(
                        tracker = %self.location,
                        line = line_no + 1,
                        "Skipping malformed tracker line: {}",
                        e
                    );
                }
            }
        }
        Ok(entries)
    }

    pub fn processed_tables(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .entries()?
            .into_iter()
            .map(|entry| entry.table_name)
            .collect())
    }

    pub fn has_processed(&self, table: &str) -> Result<bool> {
        Ok(self.processed_tables()?.contains(table))
    }

    /// Record `table` as completed. Returns `false` without writing when it
    /// is already recorded.
    pub fn mark_processed(&self, table: &str) -> Result<bool> {
        if self.has_processed(table)? {
            return Ok(false);
        }

        let entry = TrackerEntry::now(table);
        let line = serde_json::to_string(&entry)
            .map_err(|e| ScribeError::Other(format!("Failed to encode tracker entry: {}", e)))?;
        self.store.append_line(&self.location, &line)?;

        tracing::debug!(tracker = %self.location, table, "Marked table as processed");
        Ok(true)
    }

    /// Whether every table in `tables` has an entry.
    pub fn is_complete<S: AsRef<str>>(&self, tables: &[S]) -> Result<bool> {
        let processed = self.processed_tables()?;
        Ok(tables.iter().all(|t| processed.contains(t.as_ref())))
    }

    /// Delete the whole log. Only call once every table is marked.
    pub fn clear(&self) -> Result<()> {
        self.store.delete(&self.location)?;
        tracing::info!(tracker = %self.location, "Tracker cleared");
        Ok(())
    }
}
