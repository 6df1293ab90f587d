use anyhow::{Context, Result};

use schemascribe_core::ddl::{compile, DdlMode};
use schemascribe_core::schema::QualifiedTableName;

use super::{load_config, open_store, read_schema};
use crate::args::{Cli, CompileArgs};

pub async fn run(cli: &Cli, args: &CompileArgs) -> Result<()> {
    let config = load_config(&cli.config_dir)?;
    let store = open_store(&config, &cli.config_dir);

    let table = match &args.table {
        Some(name) => QualifiedTableName::parse(name)?,
        None => config
            .single_table()
            .context("No table given. Pass --table project.dataset.table or set [warehouse] table")?,
    };
    let mode = match args.mode {
        Some(mode) => DdlMode::from(mode),
        None => config.ddl_mode()?,
    };

    let schema = read_schema(store.as_ref(), &args.input)?;
    let ddl = compile(&schema, &table, args.table_description.as_deref(), mode);

    match &args.output {
        Some(location) => {
            store.write(location, &ddl)?;
            eprintln!("✓ {} DDL for {} written to {}", mode, table, location);
        }
        None => println!("{}", ddl),
    }

    Ok(())
}
