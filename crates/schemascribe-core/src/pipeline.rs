//! # Table Pipeline
//!
//! One table: load schema → describe table → chunk + enrich → write the
//! enriched schema → compile → write DDL.
//!
//! A batch runs that per table under a [`BatchTracker`]. Tables already in
//! the tracker are skipped, a table is marked only after its DDL is written,
//! and a failing table is logged and left unmarked while the batch moves on.
//! The tracker is cleared once every table of the batch is marked.

use std::sync::Arc;

use crate::ddl::{compile, DdlMode};
use crate::enrich::{Enricher, PromptContext};
use crate::error::{Result, ScribeError};
use crate::llm::client::TextGenerator;
use crate::schema::source::SchemaSource;
use crate::schema::table_name::QualifiedTableName;
use crate::schema::types::TableSchema;
use crate::storage::{join_location, BlobStore};
use crate::tracker::BatchTracker;

/// Everything a pipeline run needs besides the table itself.
pub struct PipelineContext<G> {
    pub enricher: Enricher<G>,
    pub source: Arc<dyn SchemaSource>,
    pub store: Arc<dyn BlobStore>,
    pub project: String,
    pub dataset: String,
    pub resource_prefix: String,
    /// Batch outputs land in `<output_dir>/<table>.enriched.json` and
    /// `<output_dir>/<table>.sql`.
    pub output_dir: String,
    pub mode: DdlMode,
}

impl<G: TextGenerator + 'static> PipelineContext<G> {
    /// Qualify a bare table name with the context's project and dataset.
    /// A name that is blank or already contains `.` is rejected.
    pub fn qualify(&self, table: &str) -> Result<QualifiedTableName> {
        if table.trim().is_empty() || table.contains('.') {
            return Err(ScribeError::InvalidTableName {
                name: table.to_string(),
            });
        }
        QualifiedTableName::parse(&format!("{}.{}.{}", self.project, self.dataset, table))
    }
}

/// Output locations for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableOutputs {
    pub enriched_schema: String,
    pub ddl: String,
}

impl TableOutputs {
    pub fn in_dir(dir: &str, table: &str) -> Self {
        Self {
            enriched_schema: join_location(dir, &format!("{}.enriched.json", table)),
            ddl: join_location(dir, &format!("{}.sql", table)),
        }
    }
}

/// Result of one successful table run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableOutcome {
    pub table: String,
    pub fields_total: usize,
    pub fields_described: usize,
    pub chunks_total: usize,
    pub chunks_failed: usize,
    pub has_table_description: bool,
    pub ddl_bytes: usize,
    pub outputs: TableOutputs,
}

/// A table that did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFailure {
    pub table: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: Vec<TableOutcome>,
    pub skipped: Vec<String>,
    pub failed: Vec<TableFailure>,
    pub tracker_cleared: bool,
}

impl BatchSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Progress notifications from [`run_batch_with_progress`].
#[derive(Debug, Clone, Copy)]
pub enum BatchEvent<'a> {
    Skipped(&'a str),
    Started(&'a str),
    Finished(&'a TableOutcome),
    Failed(&'a TableFailure),
}

/// Run the whole pipeline for a table from `ctx.source`, writing into
/// `ctx.output_dir`.
#[tracing::instrument(skip_all, fields(table = %table))]
pub async fn run_table<G: TextGenerator + 'static>(
    ctx: &PipelineContext<G>,
    table: &str,
) -> Result<TableOutcome> {
    let name = ctx.qualify(table)?;
    let schema = ctx.source.load_schema(table)?;
    let outputs = TableOutputs::in_dir(&ctx.output_dir, table);
    process_schema(ctx, &name, &schema, &outputs).await
}

/// Enrich an already-loaded schema and write both outputs.
pub async fn process_schema<G: TextGenerator + 'static>(
    ctx: &PipelineContext<G>,
    name: &QualifiedTableName,
    schema: &TableSchema,
    outputs: &TableOutputs,
) -> Result<TableOutcome> {
    let prompt_ctx = PromptContext::new(name.resource_name(&ctx.resource_prefix));
    tracing::info!(resource = %prompt_ctx.resource, fields = schema.len(), "Processing table");

    let table_description = match ctx.enricher.describe_table(&prompt_ctx).await {
        Ok(description) => Some(description),
        Err(e) => {
            tracing::warn!("Continuing without a table description: {}", e);
            None
        }
    };

    let enriched = ctx.enricher.enrich(schema, &prompt_ctx).await;
    if enriched.report.no_descriptions_generated() {
        tracing::warn!("No field descriptions were generated; compiling the schema as-is");
    }

    ctx.store
        .write(&outputs.enriched_schema, &enriched.schema.to_json_pretty()?)?;
    tracing::info!(location = %outputs.enriched_schema, "Enriched schema written");

    let ddl = compile(&enriched.schema, name, table_description.as_deref(), ctx.mode);
    if ddl.is_empty() {
        tracing::warn!("No DDL statements to emit");
    }
    ctx.store.write(&outputs.ddl, &ddl)?;
    tracing::info!(location = %outputs.ddl, bytes = ddl.len(), "DDL written");

    Ok(TableOutcome {
        table: name.table.clone(),
        fields_total: enriched.schema.field_count(),
        fields_described: enriched.schema.described_count(),
        chunks_total: enriched.report.chunks_total,
        chunks_failed: enriched.report.chunks_failed(),
        has_table_description: table_description.is_some(),
        ddl_bytes: ddl.len(),
        outputs: outputs.clone(),
    })
}

/// Run a batch without progress reporting.
pub async fn run_batch<G: TextGenerator + 'static>(
    ctx: &PipelineContext<G>,
    tables: &[String],
    tracker: &BatchTracker,
) -> Result<BatchSummary> {
    run_batch_with_progress(ctx, tables, tracker, |_| {}).await
}

/// Run every table in `tables`, skipping the ones `tracker` has already
/// recorded. Tracker read and write failures abort the batch; pipeline
/// failures of a single table do not.
#[tracing::instrument(skip_all, fields(tables = tables.len(), tracker = %tracker.location()))]
pub async fn run_batch_with_progress<G, F>(
    ctx: &PipelineContext<G>,
    tables: &[String],
    tracker: &BatchTracker,
    mut on_event: F,
) -> Result<BatchSummary>
where
    G: TextGenerator + 'static,
    F: FnMut(BatchEvent<'_>),
{
    let mut summary = BatchSummary::default();

    for table in tables {
        if tracker.has_processed(table)? {
            tracing::info!(table = %table, "Already processed, skipping");
            on_event(BatchEvent::Skipped(table));
            summary.skipped.push(table.clone());
            continue;
        }

        on_event(BatchEvent::Started(table));
        match run_table(ctx, table).await {
            Ok(outcome) => {
                tracker.mark_processed(table)?;
                on_event(BatchEvent::Finished(&outcome));
                summary.processed.push(outcome);
            }
            Err(e) => {
                tracing::error!(table = %table, "Table failed: {}", e);
                let failure = TableFailure {
                    table: table.clone(),
                    error: e.to_string(),
                };
                on_event(BatchEvent::Failed(&failure));
                summary.failed.push(failure);
            }
        }
    }

    if tracker.is_complete(tables)? {
        tracker.clear()?;
        summary.tracker_cleared = true;
    } else {
        tracing::warn!(
            failed = summary.failed.len(),
            "Batch incomplete; re-run to retry the remaining tables"
        );
    }

    tracing::info!(
        processed = summary.processed.len(),
        skipped = summary.skipped.len(),
        failed = summary.failed.len(),
        "Batch finished"
    );
    Ok(summary)
}
