use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use schemascribe_core::error::{Result, ScribeError};
use schemascribe_core::llm::client::TextGenerator;
use schemascribe_core::schema::types::*;
use schemascribe_core::storage::BlobStore;

/// A trimmed-down FHIR Patient schema: scalars, a repeated RECORD, a nested
/// RECORD and one RECORD that is empty all the way down.
pub fn patient_schema() -> TableSchema {
    TableSchema::new(vec![
        Field::new("id", FieldType::String).with_mode(FieldMode::Required),
        Field::new("active", FieldType::Boolean),
        Field::record(
            "name",
            vec![
                Field::new("use", FieldType::String),
                Field::new("family", FieldType::String),
                Field::new("given", FieldType::String).with_mode(FieldMode::Repeated),
            ],
        )
        .with_mode(FieldMode::Repeated),
        Field::new("gender", FieldType::String),
        Field::new("birthDate", FieldType::Date),
        Field::record(
            "meta",
            vec![
                Field::new("versionId", FieldType::String),
                Field::new("lastUpdated", FieldType::Timestamp),
                Field::record("extension", vec![]),
            ],
        ),
        Field::record("contained", vec![Field::record("resource", vec![])])
            .with_mode(FieldMode::Repeated),
        Field::new("deceasedBoolean", FieldType::Boolean),
        Field::new("multipleBirthInteger", FieldType::Integer),
    ])
}

/// `n` top-level STRING fields named `f0`, `f1`, ...
pub fn flat_schema(n: usize) -> TableSchema {
    TableSchema::new(
        (0..n)
            .map(|i| Field::new(format!("f{}", i), FieldType::String))
            .collect(),
    )
}

/// Names of the fields embedded in a field-description prompt, or `None`
/// for prompts without a schema block (table-description prompts).
pub fn prompt_field_names(prompt: &str) -> Option<Vec<String>> {
    let start = prompt.find("```json\n")? + 8;
    let end = start + prompt[start..].find("\n```")?;
    let fields: Vec<Field> = serde_json::from_str(&prompt[start..end]).ok()?;
    Some(fields.into_iter().map(|f| f.name).collect())
}

/// A well-formed response describing `fields` (recursively) with
/// `"<name> description"`.
pub fn describe_all(fields: &[Field]) -> serde_json::Value {
    serde_json::Value::Array(
        fields
            .iter()
            .map(|f| {
                let mut obj = serde_json::json!({
                    "name": f.name,
                    "type": f.field_type.as_str(),
                    "mode": f.mode.as_str(),
                    "description": format!("{} description", f.name),
                });
                if !f.fields.is_empty() {
                    obj["fields"] = describe_all(&f.fields);
                }
                obj
            })
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Blob store
// ---------------------------------------------------------------------------

/// In-memory `BlobStore`. Directory listings treat `/` as the separator.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<BTreeMap<String, String>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_objects<I, K, V>(objects: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();
        {
            let mut map = store.objects.lock().unwrap();
            for (k, v) in objects {
                map.insert(k.into(), v.into());
            }
        }
        store
    }

    pub fn get(&self, location: &str) -> Option<String> {
        self.objects.lock().unwrap().get(location).cloned()
    }

    pub fn locations(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

impl BlobStore for MemoryBlobStore {
    fn read(&self, location: &str) -> Result<Option<String>> {
        Ok(self.get(location))
    }

    fn write(&self, location: &str, data: &str) -> Result<()> {
        self.objects
            .lock()
            .unwrap()
            .insert(location.to_string(), data.to_string());
        Ok(())
    }

    fn delete(&self, location: &str) -> Result<()> {
        self.objects.lock().unwrap().remove(location);
        Ok(())
    }

    fn list(&self, dir: &str) -> Result<Vec<String>> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        Ok(self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter(|rest| !rest.contains('/'))
            .map(str::to_string)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Describes every field it is shown and answers table prompts with a fixed
/// text. Per-field delays and failures let tests force out-of-order
/// completion and partial failure.
pub struct DescribingGenerator {
    table_description: Option<String>,
    delays: HashMap<String, Duration>,
    failing_fields: Vec<String>,
    garbage_fields: Vec<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl Default for DescribingGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl DescribingGenerator {
    pub fn new() -> Self {
        Self {
            table_description: Some("Demographics and administrative information.".to_string()),
            delays: HashMap::new(),
            failing_fields: Vec::new(),
            garbage_fields: Vec::new(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Table prompts fail instead of answering.
    pub fn without_table_description(mut self) -> Self {
        self.table_description = None;
        self
    }

    pub fn with_table_description(mut self, text: impl Into<String>) -> Self {
        self.table_description = Some(text.into());
        self
    }

    /// Delay the response for any chunk containing `field`.
    pub fn delay_chunk_with(mut self, field: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(field.into(), delay);
        self
    }

    /// Return a backend error for any chunk containing `field`.
    pub fn fail_chunk_with(mut self, field: impl Into<String>) -> Self {
        self.failing_fields.push(field.into());
        self
    }

    /// Return non-JSON text for any chunk containing `field`.
    pub fn garble_chunk_with(mut self, field: impl Into<String>) -> Self {
        self.garbage_fields.push(field.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl TextGenerator for DescribingGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        let Some(names) = prompt_field_names(prompt) else {
            return self.table_description.clone().ok_or_else(|| ScribeError::Llm {
                message: "table description unavailable".to_string(),
            });
        };

        let delay = names
            .iter()
            .filter_map(|n| self.delays.get(n))
            .max()
            .copied()
            .unwrap_or(Duration::from_millis(1));
        tokio::time::sleep(delay).await;

        if names.iter().any(|n| self.failing_fields.contains(n)) {
            return Err(ScribeError::Llm {
                message: format!("scripted failure for chunk {:?}", names),
            });
        }
        if names.iter().any(|n| self.garbage_fields.contains(n)) {
            return Ok("Sorry, I can't produce JSON today.".to_string());
        }

        let start = prompt.find("```json\n").map(|i| i + 8).unwrap_or(0);
        let end = start + prompt[start..].find("\n```").unwrap_or(0);
        let fields: Vec<Field> = serde_json::from_str(&prompt[start..end]).unwrap_or_default();
        Ok(format!(
            "Here are the descriptions:\n```json\n{}\n```",
            serde_json::to_string_pretty(&describe_all(&fields)).unwrap_or_default()
        ))
    }
}

/// Always fails.
pub struct FailingGenerator;

impl TextGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(ScribeError::Llm {
            message: "backend unavailable".to_string(),
        })
    }
}
