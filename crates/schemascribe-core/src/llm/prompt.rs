//! # Prompt Templates
//!
//! Two templates drive generation: one asks for a table-level description
//! of a resource, the other asks for descriptions of one chunk of fields and
//! spells out the JSON format the response parser expects.
//!
//! Both can be overridden by dropping `table_description.txt` and
//! `field_descriptions.txt` into a prompts directory. Placeholders are
//! written `{name}`:
//!
//! | Placeholder            | Table | Fields |
//! |------------------------|:-----:|:------:|
//! | `{resource}`           |   ✓   |   ✓    |
//! | `{description_length}` |   ✓   |   ✓    |
//! | `{input_json_schema}`  |       |   ✓    |

use crate::error::{Result, ScribeError};
use crate::storage::{join_location, BlobStore};

pub const TABLE_TEMPLATE_FILE: &str = "table_description.txt";
pub const FIELDS_TEMPLATE_FILE: &str = "field_descriptions.txt";

const RESOURCE: &str = "{resource}";
const DESCRIPTION_LENGTH: &str = "{description_length}";
const INPUT_JSON_SCHEMA: &str = "{input_json_schema}";

const BUILTIN_TABLE_TEMPLATE: &str = r#"You are a healthcare data engineer documenting a data warehouse built from FHIR resources.

Write a description of the FHIR resource "{resource}" as a whole, suitable for use as the description of the warehouse table that stores it. Explain what the resource represents and what it is typically used for.

Rules:
- Plain text only: no markdown, no quotes around the answer, no preamble.
- At most {description_length} characters."#;

const BUILTIN_FIELDS_TEMPLATE: &str = r#"You are a healthcare data engineer documenting a data warehouse built from FHIR resources.

Below is part of the table schema for the FHIR resource "{resource}", as a JSON array of fields. RECORD fields contain their nested fields under "fields".

Add a "description" to every field, including every nested field, explaining what the field holds in the context of a {resource} resource.

Rules:
- Return ONLY a JSON array with no surrounding text.
- Keep every field's "name", "type", "mode" and "fields" exactly as given, in the same order. Do not add or remove fields.
- Each description is plain text of at most {description_length} characters.
- If a field already has a description, keep it unchanged.

Example of the expected output format:
[
  {"name": "id", "type": "STRING", "mode": "NULLABLE", "description": "Logical id of this artifact."},
  {"name": "meta", "type": "RECORD", "mode": "NULLABLE", "description": "Metadata about the resource.", "fields": [
    {"name": "versionId", "type": "STRING", "mode": "NULLABLE", "description": "Version specific identifier."}
  ]}
]

Schema:
```json
{input_json_schema}
```"#;

/// The pair of templates used for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplates {
    table: String,
    fields: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptTemplates {
    pub fn builtin() -> Self {
        Self {
            table: BUILTIN_TABLE_TEMPLATE.to_string(),
            fields: BUILTIN_FIELDS_TEMPLATE.to_string(),
        }
    }

    /// Built-in templates with any overrides found in `dir` applied.
    pub fn load(store: &dyn BlobStore, dir: &str) -> Result<Self> {
        let mut templates = Self::builtin();

        if let Some(text) = store.read(&join_location(dir, TABLE_TEMPLATE_FILE))? {
            tracing::debug!(dir, "Using table description template override");
            templates = templates.with_table_template(text)?;
        }
        if let Some(text) = store.read(&join_location(dir, FIELDS_TEMPLATE_FILE))? {
            tracing::debug!(dir, "Using field descriptions template override");
            templates = templates.with_fields_template(text)?;
        }

        Ok(templates)
    }

    pub fn with_table_template(mut self, template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        require_placeholders(TABLE_TEMPLATE_FILE, &template, &[RESOURCE, DESCRIPTION_LENGTH])?;
        self.table = template;
        Ok(self)
    }

    pub fn with_fields_template(mut self, template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        require_placeholders(
            FIELDS_TEMPLATE_FILE,
            &template,
            &[RESOURCE, DESCRIPTION_LENGTH, INPUT_JSON_SCHEMA],
        )?;
        self.fields = template;
        Ok(self)
    }

    pub fn table_prompt(&self, resource: &str, description_length: usize) -> String {
        self.table
            .replace(DESCRIPTION_LENGTH, &description_length.to_string())
            .replace(RESOURCE, resource)
    }

    /// The schema JSON is substituted last so its content is never scanned
    /// for placeholders.
    pub fn fields_prompt(
        &self,
        resource: &str,
        description_length: usize,
        input_json_schema: &str,
    ) -> String {
        self.fields
            .replace(DESCRIPTION_LENGTH, &description_length.to_string())
            .replace(RESOURCE, resource)
            .replace(INPUT_JSON_SCHEMA, input_json_schema)
    }
}

fn require_placeholders(name: &str, template: &str, required: &[&str]) -> Result<()> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|p| !template.contains(p))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ScribeError::Config {
            message: format!(
                "Prompt template '{}' is missing placeholder(s): {}",
                name,
                missing.join(", ")
            ),
        })
    }
}
