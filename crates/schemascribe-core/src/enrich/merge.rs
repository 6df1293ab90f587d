use std::collections::HashMap;

use crate::ddl::escape::fit_escaped;
use crate::llm::parse::FieldDescription;
use crate::schema::types::Field;

/// Copy `fields`, filling in descriptions from `described` by sibling name,
/// recursively into RECORD children.
///
/// Structure is taken from `fields` only: names in `described` that match
/// nothing are ignored and unmatched fields stay as they are. Existing
/// non-blank descriptions win. Generated text is trimmed and cut so that
/// its escaped DDL literal is at most `max_len` characters. Returns the new fields and how many descriptions
/// were applied.
pub fn apply_descriptions(
    fields: &[Field],
    described: &[FieldDescription],
    max_len: usize,
) -> (Vec<Field>, usize) {
    let mut applied = 0;
    let merged = merge_level(fields, described, max_len, &mut applied);
    (merged, applied)
}

fn merge_level(
    fields: &[Field],
    described: &[FieldDescription],
    max_len: usize,
    applied: &mut usize,
) -> Vec<Field> {
    // First occurrence wins if the response repeats a name.
    let mut by_name: HashMap<&str, &FieldDescription> = HashMap::with_capacity(described.len());
    for d in described {
        by_name.entry(d.name.as_str()).or_insert(d);
    }

    fields
        .iter()
        .map(|field| {
            let mut out = field.clone();
            let Some(matched) = by_name.get(field.name.as_str()) else {
                return out;
            };

            if !field.has_description() {
                let text = matched.description.as_deref().map(str::trim).unwrap_or("");
                let fitted = fit_escaped(text, max_len);
                if !fitted.is_empty() {
                    out.description = Some(fitted.to_string());
                    *applied += 1;
                }
            }

            if field.is_record() && !matched.fields.is_empty() {
                out.fields = merge_level(&field.fields, &matched.fields, max_len, applied);
            }

            out
        })
        .collect()
}
