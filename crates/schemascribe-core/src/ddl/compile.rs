use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::escape::{escape_description, Quote};
use super::filter::filter_empty_structs;
use crate::error::{Result, ScribeError};
use crate::schema::table_name::QualifiedTableName;
use crate::schema::types::{Field, TableSchema};

/// Which kind of DDL to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DdlMode {
    /// One `CREATE OR REPLACE TABLE` statement with every column.
    Create,
    /// `ALTER TABLE` statements that only update descriptions.
    Alter,
}

impl DdlMode {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(DdlMode::Create),
            "alter" => Ok(DdlMode::Alter),
            _ => Err(ScribeError::InvalidMode {
                mode: raw.to_string(),
            }),
        }
    }
}

impl FromStr for DdlMode {
    type Err = ScribeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for DdlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DdlMode::Create => write!(f, "create"),
            DdlMode::Alter => write!(f, "alter"),
        }
    }
}

/// Compile `schema` into DDL for `table`.
///
/// Empty RECORDs are filtered out first. A blank `table_description` is
/// treated as absent.
pub fn compile(
    schema: &TableSchema,
    table: &QualifiedTableName,
    table_description: Option<&str>,
    mode: DdlMode,
) -> String {
    let cleaned = filter_empty_structs(schema);
    let table_description = table_description.filter(|d| !d.trim().is_empty());

    match mode {
        DdlMode::Create => create_table_sql(&cleaned, table, table_description),
        DdlMode::Alter => alter_table_sql(&cleaned, table, table_description),
    }
}

/// `compile` with the mode given as text, as it arrives from config files.
pub fn compile_with_mode_str(
    schema: &TableSchema,
    table: &QualifiedTableName,
    table_description: Option<&str>,
    mode: &str,
) -> Result<String> {
    Ok(compile(schema, table, table_description, DdlMode::parse(mode)?))
}

fn create_table_sql(
    schema: &TableSchema,
    table: &QualifiedTableName,
    table_description: Option<&str>,
) -> String {
    let columns: Vec<String> = schema.fields.iter().map(field_sql).collect();

    let mut sql = format!(
        "CREATE OR REPLACE TABLE {} (\n  {}\n)",
        table.quoted(),
        columns.join(",\n  ")
    );

    match table_description {
        Some(desc) => sql.push_str(&format!(
            "\nOPTIONS(description=\"{}\");",
            escape_description(desc, Quote::Double)
        )),
        None => sql.push(';'),
    }

    sql
}

/// Render one column or struct member: `name TYPE [OPTIONS(...)]`.
fn field_sql(field: &Field) -> String {
    let mut definition = format!("{} {}", field.name, type_sql(field));

    if field.has_description() {
        let desc = field.description.as_deref().unwrap_or_default();
        definition.push_str(&format!(
            " OPTIONS(description='{}')",
            escape_description(desc, Quote::Single)
        ));
    }

    definition
}

fn type_sql(field: &Field) -> String {
    let base = if field.is_record() {
        let members: Vec<String> = field.fields.iter().map(field_sql).collect();
        format!("STRUCT<{}>", members.join(", "))
    } else {
        field.field_type.ddl_name().to_string()
    };

    if field.is_repeated() {
        format!("ARRAY<{}>", base)
    } else {
        base
    }
}

/// Up to two statements: the table description, then one statement covering
/// every described top-level scalar column. Nested fields cannot be altered
/// in place, so RECORD columns are skipped.
fn alter_table_sql(
    schema: &TableSchema,
    table: &QualifiedTableName,
    table_description: Option<&str>,
) -> String {
    let mut statements = Vec::new();

    if let Some(desc) = table_description {
        statements.push(format!(
            "ALTER TABLE {}\n  SET OPTIONS(description=\"{}\");",
            table.quoted(),
            escape_description(desc, Quote::Double)
        ));
    }

    let column_ops: Vec<String> = schema
        .fields
        .iter()
        .filter(|f| !f.name.is_empty() && !f.is_record() && f.has_description())
        .map(|f| {
            format!(
                "ALTER COLUMN {} SET OPTIONS(description=\"{}\")",
                f.name,
                escape_description(f.description.as_deref().unwrap_or_default(), Quote::Double)
            )
        })
        .collect();

    if !column_ops.is_empty() {
        statements.push(format!(
            "ALTER TABLE {}\n  {};",
            table.quoted(),
            column_ops.join(",\n  ")
        ));
    }

    statements.join("\n")
}
