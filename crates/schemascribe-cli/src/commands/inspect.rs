use anyhow::Result;
use comfy_table::{Cell, Table as ComfyTable};

use schemascribe_core::schema::chunk::chunk_schema;
use schemascribe_core::schema::types::Field;

use super::{load_config, open_store, read_schema};
use crate::args::{Cli, InspectArgs, InspectFormat};

pub async fn run(cli: &Cli, args: &InspectArgs) -> Result<()> {
    let config = load_config(&cli.config_dir)?;
    let store = open_store(&config, &cli.config_dir);
    let schema = read_schema(store.as_ref(), &args.input)?;
    let chunk_size = args.chunk_size.unwrap_or_else(|| config.chunk_size());
    let chunks = chunk_schema(&schema, chunk_size);

    match args.format {
        InspectFormat::Json => {
            let plan: Vec<serde_json::Value> = chunks
                .iter()
                .map(|c| {
                    serde_json::json!({
                        "index": c.index,
                        "fields": c.fields.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "fields": schema.field_count(),
                    "records": schema.record_count(),
                    "described": schema.described_count(),
                    "chunks": plan,
                }))?
            );
        }
        InspectFormat::Table => {
            println!("Schema: {}", args.input);
            println!(
                "Top-level: {}  Fields: {}  Records: {}  Described: {}",
                schema.len(),
                schema.field_count(),
                schema.record_count(),
                schema.described_count()
            );
            println!();

            println!("━━━ Fields ━━━");
            let mut t = ComfyTable::new();
            t.set_header(vec!["Field", "Type", "Mode", "Chunk", "Description"]);
            for chunk in &chunks {
                for field in &chunk.fields {
                    add_field_rows(&mut t, field, 0, Some(chunk.index));
                }
            }
            println!("{}", t);
            println!();

            println!("━━━ Chunk plan (size {}) ━━━", chunk_size.max(1));
            let mut plan = ComfyTable::new();
            plan.set_header(vec!["Chunk", "Units", "Fields incl. nested", "First", "Last"]);
            for chunk in &chunks {
                let nested: usize = chunk.fields.iter().map(count_subtree).sum();
                plan.add_row(vec![
                    Cell::new(chunk.index),
                    Cell::new(chunk.units()),
                    Cell::new(nested),
                    Cell::new(chunk.fields.first().map(|f| f.name.as_str()).unwrap_or("")),
                    Cell::new(chunk.fields.last().map(|f| f.name.as_str()).unwrap_or("")),
                ]);
            }
            println!("{}", plan);
        }
    }

    Ok(())
}

fn add_field_rows(t: &mut ComfyTable, field: &Field, depth: usize, chunk: Option<usize>) {
    let description = field.description.as_deref().unwrap_or("");
    let short: String = description.chars().take(60).collect();
    let short = if description.chars().count() > 60 {
        format!("{}…", short)
    } else {
        short
    };

    t.add_row(vec![
        Cell::new(format!("{}{}", "  ".repeat(depth), field.name)),
        Cell::new(field.field_type.to_string()),
        Cell::new(field.mode.to_string()),
        Cell::new(chunk.map(|c| c.to_string()).unwrap_or_default()),
        Cell::new(short),
    ]);

    for child in &field.fields {
        add_field_rows(t, child, depth + 1, None);
    }
}

fn count_subtree(field: &Field) -> usize {
    1 + field.fields.iter().map(count_subtree).sum::<usize>()
}
