//! # Configuration File Parser
//!
//! Reads and parses `schemascribe.toml`, the optional configuration file
//! that supplies defaults for every CLI flag. Supports:
//!
//! - `[warehouse]`: project, dataset, the single table or batch table list
//! - `[files]`: input/output locations for single-table and batch runs
//! - `[llm]`: model, chunk size, concurrency, strategy, response cache
//! - `[ddl]`: `create` or `alter`
//! - `[prompts]`: directory with prompt template overrides
//!
//! Example `schemascribe.toml`:
//!
//! ```toml
//! [warehouse]
//! project = "my-project"
//! dataset = "fhir"
//! table = "fhir_patient"
//! tables = ["fhir_patient", "fhir_observation"]
//!
//! [files]
//! input_schema = "schemas/fhir_patient.json"
//! output_schema = "out/fhir_patient.enriched.json"
//! sql_output = "out/fhir_patient.sql"
//! schema_dir = "schemas"
//! output_dir = "out"
//!
//! [llm]
//! chunk_size = 15
//! max_concurrency = 4
//! strategy = "concurrent"
//!
//! [ddl]
//! mode = "alter"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::ddl::DdlMode;
use crate::enrich::{EnrichmentStrategy, DEFAULT_MAX_CONCURRENCY};
use crate::error::{Result, ScribeError};
use crate::schema::chunk::DEFAULT_CHUNK_SIZE;
use crate::schema::table_name::{QualifiedTableName, DEFAULT_RESOURCE_PREFIX};
use crate::storage::join_location;
use crate::tracker::TRACKER_FILE_NAME;

/// Default config file name.
pub const CONFIG_FILE_NAME: &str = "schemascribe.toml";

const DEFAULT_SCHEMA_DIR: &str = "schemas";
const DEFAULT_OUTPUT_DIR: &str = "out";

/// Top-level schemascribe.toml structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScribeConfig {
    pub warehouse: WarehouseConfig,
    pub files: FilesConfig,
    pub llm: LlmConfig,
    pub ddl: DdlConfig,
    pub prompts: PromptsConfig,

    /// Absolute path to the directory containing schemascribe.toml.
    #[serde(skip)]
    pub config_dir: Option<PathBuf>,
}

/// Which warehouse tables to work on.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    pub project: Option<String>,
    pub dataset: Option<String>,
    /// Table for single-table runs.
    pub table: Option<String>,
    /// Tables for batch runs (empty = every schema in `files.schema_dir`).
    pub tables: Vec<String>,
    /// Prefix stripped from table names to get the resource name.
    pub resource_prefix: Option<String>,
}

/// Input and output locations. Plain paths or `file://` URIs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    pub input_schema: Option<String>,
    pub output_schema: Option<String>,
    pub sql_output: Option<String>,
    pub schema_dir: Option<String>,
    pub output_dir: Option<String>,
    pub tracker: Option<String>,
}

/// Text-generation settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: Option<String>,
    pub chunk_size: Option<usize>,
    pub max_concurrency: Option<usize>,
    /// `"concurrent"` (default) or `"sequential"`.
    pub strategy: Option<String>,
    /// Cache responses on disk (default true).
    pub cache: Option<bool>,
    pub cache_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DdlConfig {
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    pub dir: Option<String>,
}

/// Read and parse a schemascribe.toml file from the given directory.
///
/// Returns `None` if the file doesn't exist (config is optional).
/// Returns an error if the file exists but can't be parsed or validated.
pub fn read_config(dir: &Path) -> Result<Option<ScribeConfig>> {
    let path = dir.join(CONFIG_FILE_NAME);
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(&path).map_err(|e| ScribeError::Config {
        message: format!("Failed to read {}: {}", path.display(), e),
    })?;

    let mut config = parse_config(&content).map_err(|e| match e {
        ScribeError::Config { message } => ScribeError::Config {
            message: format!("{}: {}", path.display(), message),
        },
        other => other,
    })?;

    config.config_dir = Some(std::fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf()));

    Ok(Some(config))
}

/// Parse and validate config text.
pub fn parse_config(content: &str) -> Result<ScribeConfig> {
    let config: ScribeConfig = toml::from_str(content).map_err(|e| ScribeError::Config {
        message: format!("Failed to parse config: {}", e),
    })?;
    config.validate()?;
    Ok(config)
}

impl ScribeConfig {
    /// Validate semantic constraints that serde cannot enforce.
    pub fn validate(&self) -> Result<()> {
        if self.llm.chunk_size == Some(0) {
            return Err(config_error("llm.chunk_size must be at least 1"));
        }
        if self.llm.max_concurrency == Some(0) {
            return Err(config_error("llm.max_concurrency must be at least 1"));
        }

        self.ddl_mode()?;
        self.strategy()?;

        let single_table_files = self.files.input_schema.is_some()
            || self.files.output_schema.is_some()
            || self.files.sql_output.is_some();
        if single_table_files && self.warehouse.table.is_none() {
            return Err(config_error(
                "files.input_schema, files.output_schema and files.sql_output \
                 require warehouse.table to be set",
            ));
        }

        let names_tables = self.warehouse.table.is_some() || !self.warehouse.tables.is_empty();
        if names_tables && (self.warehouse.project.is_none() || self.warehouse.dataset.is_none()) {
            return Err(config_error(
                "warehouse.project and warehouse.dataset are required when tables are configured",
            ));
        }

        for table in self.warehouse.tables.iter().chain(self.warehouse.table.iter()) {
            if table.trim().is_empty() || table.contains('.') {
                return Err(config_error(&format!(
                    "warehouse table '{}' must be a bare table name; project and dataset \
                     are configured separately",
                    table
                )));
            }
        }

        Ok(())
    }

    pub fn ddl_mode(&self) -> Result<DdlMode> {
        match &self.ddl.mode {
            Some(mode) => DdlMode::parse(mode),
            None => Ok(DdlMode::Create),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.llm.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE)
    }

    pub fn max_concurrency(&self) -> usize {
        self.llm.max_concurrency.unwrap_or(DEFAULT_MAX_CONCURRENCY)
    }

    pub fn strategy(&self) -> Result<EnrichmentStrategy> {
        EnrichmentStrategy::from_name(
            self.llm.strategy.as_deref().unwrap_or("concurrent"),
            self.max_concurrency(),
        )
    }

    pub fn cache_enabled(&self) -> bool {
        self.llm.cache.unwrap_or(true)
    }

    pub fn resource_prefix(&self) -> &str {
        self.warehouse
            .resource_prefix
            .as_deref()
            .unwrap_or(DEFAULT_RESOURCE_PREFIX)
    }

    pub fn schema_dir(&self) -> &str {
        self.files.schema_dir.as_deref().unwrap_or(DEFAULT_SCHEMA_DIR)
    }

    pub fn output_dir(&self) -> &str {
        self.files.output_dir.as_deref().unwrap_or(DEFAULT_OUTPUT_DIR)
    }

    /// Tracker location; defaults to a hidden file in the output directory.
    pub fn tracker_location(&self) -> String {
        match &self.files.tracker {
            Some(location) => location.clone(),
            None => join_location(self.output_dir(), TRACKER_FILE_NAME),
        }
    }

    /// Qualify a bare table name with the configured project and dataset.
    pub fn qualify(&self, table: &str) -> Result<QualifiedTableName> {
        let project = self
            .warehouse
            .project
            .as_deref()
            .ok_or_else(|| config_error("warehouse.project is not set"))?;
        let dataset = self
            .warehouse
            .dataset
            .as_deref()
            .ok_or_else(|| config_error("warehouse.dataset is not set"))?;
        QualifiedTableName::parse(&format!("{}.{}.{}", project, dataset, table))
    }

    /// The single table to enrich, fully qualified.
    pub fn single_table(&self) -> Result<QualifiedTableName> {
        let table = self
            .warehouse
            .table
            .as_deref()
            .ok_or_else(|| config_error("warehouse.table is not set"))?;
        self.qualify(table)
    }
}

fn config_error(message: &str) -> ScribeError {
    ScribeError::Config {
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[warehouse]
project = "my-project"
dataset = "fhir"
table = "fhir_patient"
tables = ["fhir_patient", "fhir_observation"]
resource_prefix = "fhir_"

[files]
input_schema = "schemas/fhir_patient.json"
output_schema = "out/fhir_patient.enriched.json"
sql_output = "out/fhir_patient.sql"
schema_dir = "schemas"
output_dir = "out"
tracker = "out/progress.ndjson"

[llm]
model = "claude-sonnet-4-20250514"
chunk_size = 10
max_concurrency = 8
strategy = "sequential"
cache = false

[ddl]
mode = "ALTER"

[prompts]
dir = "prompts"
"#;

        let config = parse_config(toml).unwrap();

        assert_eq!(config.warehouse.project.as_deref(), Some("my-project"));
        assert_eq!(config.warehouse.tables.len(), 2);
        assert_eq!(config.chunk_size(), 10);
        assert_eq!(config.max_concurrency(), 8);
        assert_eq!(config.strategy().unwrap(), EnrichmentStrategy::Sequential);
        assert!(!config.cache_enabled());
        assert_eq!(config.ddl_mode().unwrap(), DdlMode::Alter);
        assert_eq!(config.tracker_location(), "out/progress.ndjson");
        assert_eq!(config.prompts.dir.as_deref(), Some("prompts"));
        assert_eq!(
            config.single_table().unwrap().to_string(),
            "my-project.fhir.fhir_patient"
        );
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();

        assert!(config.warehouse.table.is_none());
        assert_eq!(config.chunk_size(), DEFAULT_CHUNK_SIZE);
        assert_eq!(config.max_concurrency(), DEFAULT_MAX_CONCURRENCY);
        assert_eq!(
            config.strategy().unwrap(),
            EnrichmentStrategy::Concurrent { max_concurrency: 4 }
        );
        assert!(config.cache_enabled());
        assert_eq!(config.ddl_mode().unwrap(), DdlMode::Create);
        assert_eq!(config.resource_prefix(), "fhir_");
        assert_eq!(
            config.tracker_location(),
            "out/.schemascribe-tracker.ndjson"
        );
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let err = parse_config("[llm]\nchunk_size = 0\n").unwrap_err();
        assert!(err.to_string().contains("chunk_size"));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let err = parse_config("[llm]\nmax_concurrency = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_concurrency"));
    }

    #[test]
    fn test_invalid_mode_rejected() {
        let err = parse_config("[ddl]\nmode = \"merge\"\n").unwrap_err();
        assert!(matches!(err, ScribeError::InvalidMode { .. }));
    }

    #[test]
    fn test_invalid_strategy_rejected() {
        assert!(parse_config("[llm]\nstrategy = \"parallel\"\n").is_err());
    }

    #[test]
    fn test_single_table_files_require_table() {
        let err = parse_config("[files]\ninput_schema = \"a.json\"\n").unwrap_err();
        assert!(err.to_string().contains("warehouse.table"));
    }

    #[test]
    fn test_tables_require_project_and_dataset() {
        let err = parse_config("[warehouse]\ntables = [\"fhir_patient\"]\n").unwrap_err();
        assert!(err.to_string().contains("warehouse.project"));
    }

    #[test]
    fn test_qualified_table_names_rejected_in_table_list() {
        let toml = r#"
[warehouse]
project = "p"
dataset = "d"
tables = ["p.d.fhir_patient"]
"#;
        assert!(parse_config(toml).is_err());
    }

    #[test]
    fn test_read_config_nonexistent() {
        let result = read_config(Path::new("/nonexistent/dir"));
        assert!(result.is_ok());
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn test_read_config_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[warehouse]\nproject = \"p\"\ndataset = \"d\"\ntable = \"fhir_patient\"\n",
        )
        .unwrap();

        let config = read_config(dir.path()).unwrap().unwrap();
        assert_eq!(config.single_table().unwrap().table, "fhir_patient");
        assert!(config.config_dir.is_some());
    }

    #[test]
    fn test_read_config_parse_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[llm\nbroken").unwrap();

        let err = read_config(dir.path()).unwrap_err();
        assert!(err.to_string().contains(CONFIG_FILE_NAME));
    }
}
