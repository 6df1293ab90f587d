//! # LLM Response Parser
//!
//! Decodes generator responses. Field responses must be a JSON array of
//! field objects carrying `description`; anything else is reported as
//! [`ParsedChunk::Unparsable`] rather than an error, so the executor can
//! treat it like any other per-chunk failure.
//!
//! Only names, descriptions and nested `fields` are read back. Types and
//! modes in the response are ignored: structure always comes from the input
//! schema.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use super::client::truncate;

/// Descriptions for one field as returned by the generator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldDescription {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDescription>,
}

/// Outcome of decoding one chunk response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedChunk {
    Parsed(Vec<FieldDescription>),
    Unparsable(String),
}

/// Decode a field-description response.
///
/// Two-stage decode: the array is parsed untyped first, then each element
/// individually, so one malformed row only drops that row. A response with
/// no usable row at all is unparsable.
pub fn parse_field_response(response: &str) -> ParsedChunk {
    let json_str = extract_json_array(response);

    let raw_array: Vec<serde_json::Value> = match serde_json::from_str(json_str) {
        Ok(values) => values,
        Err(e) => {
            return ParsedChunk::Unparsable(format!(
                "response is not a JSON array: {}. Response: {}",
                e,
                truncate(response, 200),
            ))
        }
    };

    let total = raw_array.len();
    let mut fields = Vec::with_capacity(total);
    for raw_obj in raw_array {
        match serde_json::from_value::<FieldDescription>(raw_obj.clone()) {
            Ok(valid) => fields.push(valid),
            Err(e) => {
                tracing::debug!(
                    "Dropped invalid field row from LLM response: {}. Error: {}",
                    raw_obj,
                    e,
                );
            }
        }
    }

    if fields.is_empty() {
        return ParsedChunk::Unparsable(format!(
            "no valid field objects in response ({} element(s))",
            total
        ));
    }

    if !fields.iter().any(has_any_description) {
        return ParsedChunk::Unparsable("response carries no descriptions".to_string());
    }

    ParsedChunk::Parsed(fields)
}

fn has_any_description(field: &FieldDescription) -> bool {
    field
        .description
        .as_deref()
        .is_some_and(|d| !d.trim().is_empty())
        || field.fields.iter().any(has_any_description)
}

/// Clean a free-text table description. `None` when nothing is left.
///
/// Strips a surrounding code fence and one layer of matching quotes.
pub fn parse_table_description(response: &str) -> Option<String> {
    let mut text = response.trim();

    if let Some(inner) = strip_fence(text) {
        text = inner;
    }

    for quote in ['"', '\''] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            text = text[1..text.len() - 1].trim();
            break;
        }
    }

    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn strip_fence(text: &str) -> Option<&str> {
    let rest = skip_info_line(text.strip_prefix("```")?);
    let end = rest.rfind("```")?;
    Some(rest[..end].trim())
}

/// Body of the first fenced block anywhere in `text`, whatever its info
/// string (`json`, `JSON`, `javascript`, none).
fn first_fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let rest = skip_info_line(&text[start + 3..]);
    let end = rest.find("```")?;
    Some(rest[..end].trim())
}

fn skip_info_line(rest: &str) -> &str {
    match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    }
}

static ARRAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[\s*\{.*\}\s*\]").unwrap());

/// Extract the JSON array from a response that may contain markdown fences
/// or conversational wrapper text.
///
/// Three tiers:
/// 1. The first fenced block, if its body is a JSON array
/// 2. Regex matching `[{...}]`, which skips stray brackets in prose like
///    `[as requested]`
/// 3. Raw trimmed response
pub(crate) fn extract_json_array(response: &str) -> &str {
    let trimmed = response.trim();

    if let Some(block) = first_fenced_block(trimmed) {
        if serde_json::from_str::<Vec<serde_json::Value>>(block).is_ok() {
            return block;
        }
    }

    if let Some(mat) = ARRAY_RE.find(trimmed) {
        return mat.as_str();
    }

    trimmed
}
