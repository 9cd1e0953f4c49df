//! Prompt rendering and parsing of model output against a schema.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::model::ExtractedFields;
use crate::pipeline::ExtractionSchema;

pub const DEFAULT_PROMPT_TEMPLATE: &str = "Extract the requested information from the document \
text below. Answer only with the requested fields and use an empty string when a value is not \
present in the text.\n\n{format_instructions}\n\nDocument text:\n{text}";

/// Why a completion could not be turned into [`ExtractedFields`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    /// No JSON object could be read from the completion.
    Malformed(String),
    /// The object lacks some schema fields.
    Missing(Vec<String>),
}

impl std::fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseFailure::Malformed(reason) => write!(f, "invalid JSON: {}", reason),
            ParseFailure::Missing(fields) => write!(f, "missing fields: {}", fields.join(", ")),
        }
    }
}

/// Tells the model which keys to produce.
pub fn format_instructions(schema: &ExtractionSchema) -> String {
    let mut out = String::from(
        "The output should be a markdown code snippet formatted in the following schema, \
         including the leading and trailing \"```json\" and \"```\":\n\n```json\n{\n",
    );
    for (name, description) in schema.iter() {
        out.push_str(&format!("\t\"{}\": string  // {}\n", name, description));
    }
    out.push_str("}\n```");
    out
}

pub fn render_prompt(template: &str, schema: &ExtractionSchema, text: &str) -> String {
    template
        .replace("{format_instructions}", &format_instructions(schema))
        .replace("{text}", text)
}

/// Asks the model to fix a completion that did not fit the schema.
pub fn repair_prompt(schema: &ExtractionSchema, completion: &str, failure: &ParseFailure) -> String {
    format!(
        "Instructions:\n--------------\n{}\n--------------\nCompletion:\n--------------\n{}\n\
         --------------\n\nAbove, the Completion did not satisfy the constraints given in the \
         Instructions.\nError:\n--------------\n{}\n--------------\n\nPlease try again. Please \
         only respond with an answer that satisfies the constraints laid out in the Instructions:",
        format_instructions(schema),
        completion,
        failure
    )
}

static RE_FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").unwrap());

/// The JSON text of a completion: the first fenced block, else the outermost braces.
pub fn extract_json_block(completion: &str) -> Option<&str> {
    if let Some(block) = RE_FENCED_BLOCK
        .captures(completion)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
    {
        return Some(block);
    }

    let start = completion.find('{')?;
    let end = completion.rfind('}')?;
    (start < end).then(|| &completion[start..=end])
}

/// Reads schema fields out of a completion.
///
/// Values that are not strings are rendered as JSON text and `null` becomes an
/// empty string. Keys outside the schema are kept after the schema fields.
pub fn parse_completion(
    schema: &ExtractionSchema,
    completion: &str,
) -> Result<ExtractedFields, ParseFailure> {
    let json = extract_json_block(completion)
        .ok_or_else(|| ParseFailure::Malformed("no JSON object found".to_string()))?;
    let value: Value =
        serde_json::from_str(json).map_err(|e| ParseFailure::Malformed(e.to_string()))?;
    let Value::Object(mut object) = value else {
        return Err(ParseFailure::Malformed("expected a JSON object".to_string()));
    };

    let mut fields = ExtractedFields::new();
    let mut missing = Vec::new();
    for name in schema.field_names() {
        match object.shift_remove(name) {
            Some(value) => {
                fields.insert(name.to_string(), stringify(value));
            }
            None => missing.push(name.to_string()),
        }
    }
    if !missing.is_empty() {
        return Err(ParseFailure::Missing(missing));
    }

    for (name, value) in object {
        fields.insert(name, stringify(value));
    }
    Ok(fields)
}

fn stringify(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
