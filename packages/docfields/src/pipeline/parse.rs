//! Generation models and lenient model-output parsing.
//!
//! Each field kind has a typed generation - the JSON object the model is asked
//! to return for one page. Models often wrap that object in prose or
//! markdown fences, so parsing first isolates the first complete JSON object.

use regex::Regex;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

use crate::error::Result;

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json|JSON)?(.*?)```").unwrap());

/// Isolate the JSON object in raw model output.
///
/// Fenced blocks are tried in order and the first one holding an object
/// wins; otherwise the first complete object anywhere in the text is used.
/// Returns `None` when there is no object at all.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    FENCED_BLOCK
        .captures_iter(raw)
        .filter_map(|c| c.get(1))
        .find_map(|block| first_object(block.as_str()))
        .or_else(|| first_object(raw))
}

/// The first `{` that starts a complete JSON object, up to its closing `}`.
fn first_object(text: &str) -> Option<&str> {
    text.match_indices('{').find_map(|(start, _)| {
        let rest = &text[start..];
        let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<Value>();
        match stream.next() {
            Some(Ok(Value::Object(_))) => Some(&rest[..stream.byte_offset()]),
            _ => None,
        }
    })
}

/// Parse raw model output into a typed generation.
pub fn parse_generation<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let candidate = extract_json_object(raw).unwrap_or(raw.trim());
    Ok(serde_json::from_str(candidate)?)
}

/// Key-value generation for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct KeyValueGeneration {
    /// The value exactly as written on the page; empty if not present
    #[serde(default)]
    pub value: String,

    /// The value in a canonical form (dates as YYYY-MM-DD, amounts as plain numbers)
    #[serde(default)]
    pub normalized_value: Option<String>,

    /// True if the value is cut off and continues on the next page
    #[serde(default)]
    pub continue_next_page: bool,
}

/// Bullet-point generation for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BulletPointsGeneration {
    /// Points in reading order
    #[serde(default, alias = "bullet_points")]
    pub points: Vec<String>,

    /// True if the list continues on the next page
    #[serde(default)]
    pub continue_next_page: bool,
}

/// Checkbox generation for one page.
///
/// Exactly one of `selected_option` (single) or `selected_options` (multi)
/// must be present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CheckboxGeneration {
    /// The checked label, or null if nothing is checked (single-choice groups)
    #[serde(default)]
    pub selected_option: Option<String>,

    /// All checked labels (multi-choice groups)
    #[serde(default)]
    pub selected_options: Option<Vec<String>>,

    /// True if the checkbox group continues on the next page
    #[serde(default)]
    pub continue_next_page: bool,
}

impl CheckboxGeneration {
    /// Selected labels, or an error if the selection keys are ambiguous.
    ///
    /// A `null` single selection means nothing is checked.
    pub fn into_selected(self, raw: &Value) -> std::result::Result<Vec<String>, String> {
        let has_single = raw.get("selected_option").is_some();
        let has_multi = raw.get("selected_options").is_some();
        match (has_single, has_multi) {
            (true, false) => Ok(self.selected_option.into_iter().collect()),
            (false, true) => Ok(self.selected_options.unwrap_or_default()),
            (true, true) => Err("both selected_option and selected_options present".into()),
            (false, false) => Err("neither selected_option nor selected_options present".into()),
        }
    }
}

/// Summary text, optionally labelled with the section it covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum SummaryText {
    Sectioned { section: String, summary: String },
    Plain(String),
}

/// Summary generation for one page (or one composition).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SummaryGeneration {
    pub summary: SummaryText,

    /// True if the summarized content continues on the next page
    #[serde(default)]
    pub continue_next_page: bool,
}

impl SummaryGeneration {
    /// Split into `(section, text)`.
    pub fn into_parts(self) -> (Option<String>, String) {
        match self.summary {
            SummaryText::Plain(text) => (None, text),
            SummaryText::Sectioned { section, summary } => {
                let section = Some(section).filter(|s| !s.trim().is_empty());
                (section, summary)
            }
        }
    }
}

/// Table generation for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TableGeneration {
    /// Column headers, left to right
    #[serde(default)]
    pub columns: Vec<String>,

    /// One entry per row, cells aligned with `columns`
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,

    /// True if the table continues on the next page
    #[serde(default)]
    pub continue_next_page: bool,
}

impl TableGeneration {
    /// Rows with every cell rendered as text.
    pub fn text_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect()
    }
}

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
