use std::sync::Arc;

use super::types::TableSchema;
use crate::error::{Result, ScribeError};
use crate::storage::{join_location, BlobStore};

/// Where table schemas come from.
pub trait SchemaSource: Send + Sync {
    /// Table names available from this source, sorted.
    fn list_tables(&self) -> Result<Vec<String>>;

    /// Load one table's schema.
    fn load_schema(&self, table: &str) -> Result<TableSchema>;
}

const SCHEMA_EXT: &str = ".json";
const ENRICHED_EXT: &str = ".enriched.json";

/// Schemas stored as `<dir>/<table>.json` in a blob store.
pub struct FileSchemaSource {
    store: Arc<dyn BlobStore>,
    dir: String,
}

impl FileSchemaSource {
    pub fn new(store: Arc<dyn BlobStore>, dir: impl Into<String>) -> Self {
        Self {
            store,
            dir: dir.into(),
        }
    }

    pub fn location_of(&self, table: &str) -> String {
        join_location(&self.dir, &format!("{}{}", table, SCHEMA_EXT))
    }
}

impl SchemaSource for FileSchemaSource {
    fn list_tables(&self) -> Result<Vec<String>> {
        let tables = self
            .store
            .list(&self.dir)?
            .into_iter()
            .filter(|name| !name.ends_with(ENRICHED_EXT))
            .filter_map(|name| name.strip_suffix(SCHEMA_EXT).map(str::to_string))
            .filter(|table| !table.is_empty())
            .collect();
        Ok(tables)
    }

    fn load_schema(&self, table: &str) -> Result<TableSchema> {
        let location = self.location_of(table);
        let content = self.store.read(&location)?.ok_or_else(|| ScribeError::Config {
            message: format!("No schema found for table '{}' at {}", table, location),
        })?;
        let schema = TableSchema::from_json(&content, &location)?;
        tracing::debug!(table, fields = schema.len(), "Loaded schema");
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalBlobStore;
    use tempfile::tempdir;

    fn source_in(dir: &std::path::Path) -> (Arc<LocalBlobStore>, FileSchemaSource) {
        let store = Arc::new(LocalBlobStore::new(dir));
        let source = FileSchemaSource::new(store.clone(), "schemas");
        (store, source)
    }

    #[test]
    fn test_list_tables_skips_enriched_and_other_files() {
        let dir = tempdir().unwrap();
        let (store, source) = source_in(dir.path());
        for name in [
            "fhir_patient.json",
            "fhir_observation.json",
            "fhir_patient.enriched.json",
            "README.md",
        ] {
            store.write(&format!("schemas/{}", name), "[]").unwrap();
        }

        assert_eq!(
            source.list_tables().unwrap(),
            vec!["fhir_observation".to_string(), "fhir_patient".to_string()]
        );
    }

    #[test]
    fn test_load_schema() {
        let dir = tempdir().unwrap();
        let (store, source) = source_in(dir.path());
        store
            .write(
                "schemas/fhir_patient.json",
                r#"[{"name":"id","type":"STRING","mode":"REQUIRED"}]"#,
            )
            .unwrap();

        let schema = source.load_schema("fhir_patient").unwrap();
        assert_eq!(schema.len(), 1);
        assert_eq!(schema.fields[0].name, "id");
    }

    #[test]
    fn test_missing_schema_is_error() {
        let dir = tempdir().unwrap();
        let (_, source) = source_in(dir.path());
        let err = source.load_schema("fhir_ghost").unwrap_err();
        assert!(err.to_string().contains("fhir_ghost"));
    }

    #[test]
    fn test_malformed_schema_is_format_error() {
        let dir = tempdir().unwrap();
        let (store, source) = source_in(dir.path());
        store.write("schemas/bad.json", "{ not json").unwrap();

        let err = source.load_schema("bad").unwrap_err();
        assert!(matches!(err, ScribeError::Format { .. }));
        assert!(err.is_recoverable());
    }
}
