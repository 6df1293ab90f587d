use std::sync::Arc;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use schemascribe_core::ddl::DdlMode;
use schemascribe_core::pipeline::{run_batch_with_progress, BatchEvent, PipelineContext};
use schemascribe_core::schema::{FileSchemaSource, SchemaSource};
use schemascribe_core::storage::join_location;
use schemascribe_core::tracker::{BatchTracker, TRACKER_FILE_NAME};

use super::{build_enricher, load_config, open_store};
use crate::args::{BatchArgs, Cli};

/// Enrich and compile every table in the batch.
///
/// Exit codes:
///   0: every table processed (or already processed)
///   1: at least one table failed; re-run to retry only those
pub async fn run(cli: &Cli, args: &BatchArgs) -> Result<()> {
    let config = load_config(&cli.config_dir)?;
    let store = open_store(&config, &cli.config_dir);

    let project = args
        .project
        .clone()
        .or_else(|| config.warehouse.project.clone())
        .context("No project given. Pass --project or set [warehouse] project")?;
    let dataset = args
        .dataset
        .clone()
        .or_else(|| config.warehouse.dataset.clone())
        .context("No dataset given. Pass --dataset or set [warehouse] dataset")?;
    let schema_dir = args
        .schema_dir
        .clone()
        .unwrap_or_else(|| config.schema_dir().to_string());
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| config.output_dir().to_string());
    let tracker_location = match (&args.tracker, &config.files.tracker) {
        (Some(location), _) | (None, Some(location)) => location.clone(),
        (None, None) => join_location(&output_dir, TRACKER_FILE_NAME),
    };
    let mode = match args.mode {
        Some(mode) => DdlMode::from(mode),
        None => config.ddl_mode()?,
    };

    let source = Arc::new(FileSchemaSource::new(store.clone(), schema_dir.clone()));
    let tables: Vec<String> = if !args.tables.is_empty() {
        args.tables.clone()
    } else if !config.warehouse.tables.is_empty() {
        config.warehouse.tables.clone()
    } else {
        source.list_tables()?
    };
    if tables.is_empty() {
        bail!("No tables to process. Pass --tables or add <table>.json files to {}", schema_dir);
    }

    let enricher = build_enricher(&config, store.as_ref(), &args.llm)?;
    let ctx = PipelineContext {
        enricher,
        source,
        store: store.clone(),
        project,
        dataset,
        resource_prefix: config.resource_prefix().to_string(),
        output_dir,
        mode,
    };
    let tracker = BatchTracker::new(store, tracker_location);

    let pb = ProgressBar::new(tables.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} Processing tables... {bar:40.cyan/dim} {pos}/{len} {msg}")?
            .progress_chars("█▓░"),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let summary = run_batch_with_progress(&ctx, &tables, &tracker, |event| match event {
        BatchEvent::Started(table) => pb.set_message(table.to_string()),
        BatchEvent::Skipped(_) | BatchEvent::Finished(_) | BatchEvent::Failed(_) => pb.inc(1),
    })
    .await?;

    pb.finish_with_message(format!(
        "✓ {} processed, {} skipped, {} failed",
        summary.processed.len(),
        summary.skipped.len(),
        summary.failed.len()
    ));

    for outcome in &summary.processed {
        eprintln!(
            "  {} — {}/{} fields described → {}",
            outcome.table, outcome.fields_described, outcome.fields_total, outcome.outputs.ddl
        );
    }
    for failure in &summary.failed {
        eprintln!("  ✗ {} — {}", failure.table, failure.error);
    }

    if !summary.is_success() {
        bail!(
            "{} table(s) failed. Progress saved in {}; re-run to retry them.",
            summary.failed.len(),
            tracker.location()
        );
    }

    if summary.tracker_cleared {
        eprintln!("\n✓ Batch complete, tracker cleared");
    }
    Ok(())
}
