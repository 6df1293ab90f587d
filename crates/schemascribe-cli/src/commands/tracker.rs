use anyhow::Result;
use comfy_table::{Cell, Table as ComfyTable};

use schemascribe_core::tracker::BatchTracker;

use super::{load_config, open_store};
use crate::args::{Cli, TrackerAction, TrackerArgs};

pub async fn run(cli: &Cli, args: &TrackerArgs) -> Result<()> {
    let config = load_config(&cli.config_dir)?;
    let store = open_store(&config, &cli.config_dir);
    let location = args
        .tracker
        .clone()
        .unwrap_or_else(|| config.tracker_location());
    let tracker = BatchTracker::new(store, location);

    match args.action {
        TrackerAction::Status => {
            let entries = tracker.entries()?;
            if entries.is_empty() {
                println!("No tables processed ({} is empty or missing)", tracker.location());
                return Ok(());
            }

            println!("Tracker: {}", tracker.location());
            let mut t = ComfyTable::new();
            t.set_header(vec!["Table", "Processed at"]);
            for entry in &entries {
                t.add_row(vec![Cell::new(&entry.table_name), Cell::new(&entry.processed_at)]);
            }
            println!("{}", t);

            let pending: Vec<&String> = config
                .warehouse
                .tables
                .iter()
                .filter(|table| !entries.iter().any(|e| &e.table_name == *table))
                .collect();
            if !pending.is_empty() {
                println!(
                    "Pending from config: {}",
                    pending
                        .iter()
                        .map(|s| s.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
        }
        TrackerAction::Reset => {
            tracker.clear()?;
            eprintln!("✓ Tracker {} reset", tracker.location());
        }
    }

    Ok(())
}
