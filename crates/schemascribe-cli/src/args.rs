use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "schemascribe",
    about = "Describe warehouse table schemas with an LLM and compile them to DDL",
    version,
    after_help = "Examples:\n  schemascribe enrich --table my-proj.fhir.fhir_patient --input schemas/fhir_patient.json\n  schemascribe batch --project my-proj --dataset fhir --schema-dir schemas --output-dir out\n  schemascribe compile --input out/fhir_patient.enriched.json --table my-proj.fhir.fhir_patient --mode alter\n  schemascribe inspect --input schemas/fhir_patient.json\n  schemascribe tracker status"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory containing schemascribe.toml
    #[arg(long, global = true, default_value = ".")]
    pub config_dir: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Enrich one table's schema and compile it to DDL
    Enrich(EnrichArgs),

    /// Enrich and compile every table of a dataset, resumably
    Batch(BatchArgs),

    /// Compile an (enriched) schema file to DDL without calling an LLM
    Compile(CompileArgs),

    /// Show a schema's field tree and chunk plan
    Inspect(InspectArgs),

    /// Inspect or reset the batch progress tracker
    Tracker(TrackerArgs),
}

/// Text-generation flags shared by `enrich` and `batch`.
#[derive(Args, Debug, Clone, Default)]
pub struct LlmArgs {
    /// LLM model to use (defaults per provider)
    #[arg(long)]
    pub model: Option<String>,

    /// Top-level fields per LLM request
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Maximum concurrent LLM requests
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// Send chunks one at a time
    #[arg(long)]
    pub sequential: bool,

    /// Disable the on-disk response cache
    #[arg(long)]
    pub no_cache: bool,

    /// Directory with prompt template overrides
    #[arg(long)]
    pub prompts_dir: Option<String>,
}

#[derive(Parser, Debug)]
pub struct EnrichArgs {
    /// Table as project.dataset.table (falls back to [warehouse] config)
    #[arg(long)]
    pub table: Option<String>,

    /// Input schema JSON
    #[arg(short, long)]
    pub input: Option<String>,

    /// Where to write the enriched schema JSON
    #[arg(long)]
    pub output_schema: Option<String>,

    /// Where to write the DDL
    #[arg(long)]
    pub sql_output: Option<String>,

    /// DDL mode
    #[arg(long)]
    pub mode: Option<DdlModeArg>,

    #[command(flatten)]
    pub llm: LlmArgs,
}

#[derive(Parser, Debug)]
pub struct BatchArgs {
    /// Warehouse project
    #[arg(long)]
    pub project: Option<String>,

    /// Warehouse dataset
    #[arg(long)]
    pub dataset: Option<String>,

    /// Tables to process (default: every schema in --schema-dir)
    #[arg(long, value_delimiter = ',')]
    pub tables: Vec<String>,

    /// Directory with <table>.json schema files
    #[arg(long)]
    pub schema_dir: Option<String>,

    /// Directory for <table>.enriched.json and <table>.sql
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Tracker location (default: <output-dir>/.schemascribe-tracker.ndjson)
    #[arg(long)]
    pub tracker: Option<String>,

    /// DDL mode
    #[arg(long)]
    pub mode: Option<DdlModeArg>,

    #[command(flatten)]
    pub llm: LlmArgs,
}

#[derive(Parser, Debug)]
pub struct CompileArgs {
    /// Schema JSON (usually an enriched schema)
    #[arg(short, long)]
    pub input: String,

    /// Table as project.dataset.table
    #[arg(long)]
    pub table: Option<String>,

    /// DDL mode
    #[arg(long)]
    pub mode: Option<DdlModeArg>,

    /// Table-level description to include
    #[arg(long)]
    pub table_description: Option<String>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    pub output: Option<String>,
}

#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Schema JSON
    #[arg(short, long)]
    pub input: String,

    /// Top-level fields per chunk for the chunk plan
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Output format
    #[arg(long, default_value = "table")]
    pub format: InspectFormat,
}

#[derive(Parser, Debug)]
pub struct TrackerArgs {
    #[command(subcommand)]
    pub action: TrackerAction,

    /// Tracker location (default from config)
    #[arg(long, global = true)]
    pub tracker: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum TrackerAction {
    /// List processed tables
    Status,
    /// Delete the tracker so the next batch starts over
    Reset,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DdlModeArg {
    Create,
    Alter,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum InspectFormat {
    Table,
    Json,
}

impl From<DdlModeArg> for schemascribe_core::ddl::DdlMode {
    fn from(mode: DdlModeArg) -> Self {
        match mode {
            DdlModeArg::Create => schemascribe_core::ddl::DdlMode::Create,
            DdlModeArg::Alter => schemascribe_core::ddl::DdlMode::Alter,
        }
    }
}
