use crate::schema::types::{Field, TableSchema};

/// Remove every RECORD that has no children left after its own children
/// were filtered. Depth-first; the input is not modified.
///
/// A STRUCT with zero members is invalid DDL, so this runs before either
/// compile mode.
pub fn filter_empty_structs(schema: &TableSchema) -> TableSchema {
    TableSchema::new(filter_fields(&schema.fields))
}

fn filter_fields(fields: &[Field]) -> Vec<Field> {
    let mut kept = Vec::with_capacity(fields.len());

    for field in fields {
        if !field.is_record() {
            kept.push(field.clone());
            continue;
        }

        let children = filter_fields(&field.fields);
        if children.is_empty() {
            tracing::debug!(field = %field.name, "Skipping empty struct field");
            continue;
        }

        kept.push(Field {
            fields: children,
            ..field.clone()
        });
    }

    kept
}
