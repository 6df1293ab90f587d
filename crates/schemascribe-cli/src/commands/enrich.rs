use std::sync::Arc;

use anyhow::{Context, Result};

use schemascribe_core::ddl::DdlMode;
use schemascribe_core::pipeline::{process_schema, PipelineContext, TableOutputs};
use schemascribe_core::schema::{FileSchemaSource, QualifiedTableName};
use schemascribe_core::storage::join_location;

use super::{build_enricher, load_config, open_store, read_schema, spinner};
use crate::args::{Cli, EnrichArgs};

pub async fn run(cli: &Cli, args: &EnrichArgs) -> Result<()> {
    let config = load_config(&cli.config_dir)?;
    let store = open_store(&config, &cli.config_dir);

    let table = match &args.table {
        Some(name) => QualifiedTableName::parse(name)?,
        None => config
            .single_table()
            .context("No table given. Pass --table project.dataset.table or set [warehouse] table")?,
    };

    let input = args
        .input
        .clone()
        .or_else(|| config.files.input_schema.clone())
        .unwrap_or_else(|| join_location(config.schema_dir(), &format!("{}.json", table.table)));
    let defaults = TableOutputs::in_dir(config.output_dir(), &table.table);
    let outputs = TableOutputs {
        enriched_schema: args
            .output_schema
            .clone()
            .or_else(|| config.files.output_schema.clone())
            .unwrap_or(defaults.enriched_schema),
        ddl: args
            .sql_output
            .clone()
            .or_else(|| config.files.sql_output.clone())
            .unwrap_or(defaults.ddl),
    };
    let mode = match args.mode {
        Some(mode) => DdlMode::from(mode),
        None => config.ddl_mode()?,
    };

    let schema = read_schema(store.as_ref(), &input)?;
    let enricher = build_enricher(&config, store.as_ref(), &args.llm)?;

    let ctx = PipelineContext {
        enricher,
        source: Arc::new(FileSchemaSource::new(store.clone(), config.schema_dir())),
        store,
        project: table.project.clone(),
        dataset: table.dataset.clone(),
        resource_prefix: config.resource_prefix().to_string(),
        output_dir: config.output_dir().to_string(),
        mode,
    };

    let pb = spinner(
        "1/1",
        &format!("Enriching {} ({} fields)...", table, schema.field_count()),
    )?;
    let outcome = process_schema(&ctx, &table, &schema, &outputs).await?;
    pb.finish_with_message(format!(
        "Enriching {}... ✓ {}/{} fields described",
        table, outcome.fields_described, outcome.fields_total
    ));

    if outcome.chunks_failed > 0 {
        eprintln!(
            "⚠ {} of {} chunks got no descriptions (see logs with RUST_LOG=warn)",
            outcome.chunks_failed, outcome.chunks_total
        );
    }
    if !outcome.has_table_description {
        eprintln!("⚠ No table description was generated");
    }

    eprintln!("\n✓ Enriched schema written to {}", outputs.enriched_schema);
    eprintln!("✓ {} DDL written to {} ({} bytes)", mode, outputs.ddl, outcome.ddl_bytes);

    Ok(())
}
