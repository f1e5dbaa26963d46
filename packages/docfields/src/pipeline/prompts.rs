//! Prompts for per-page extraction and summary composition.
//!
//! Every page prompt embeds the JSON schema of the generation it expects, so
//! the model's answer can be parsed into the matching type in
//! [`crate::pipeline::parse`].

use regex::{Captures, Regex};
use schemars::{schema_for, JsonSchema};
use std::sync::LazyLock;

use crate::pipeline::parse::{
    BulletPointsGeneration, CheckboxGeneration, KeyValueGeneration, SummaryGeneration,
    TableGeneration,
};
use crate::traits::detector::DetectedCheckbox;
use crate::types::field::{CheckboxCardinality, FieldSpec};

/// Prompt for extracting a single value from a page.
pub const KEY_VALUE_PROMPT: &str = r#"You are reading one page of a document.

Find the value of: {target}
{line_rule}
{prev_section}
If the value is not on this page, return an empty "value".
Set "continue_next_page" to true only if the value is visibly cut off at the end of this page.

Respond with a single JSON object matching this schema:
{schema}"#;

/// Prompt for extracting bullet points from a page.
pub const BULLET_POINTS_PROMPT: &str = r#"You are reading one page of a document.

List every point that belongs to: {target}
Keep the order in which the points appear. Write each point as one entry, without bullet characters.
If nothing relevant is on this page, return an empty list.
Set "continue_next_page" to true only if the list visibly continues past the end of this page.

Respond with a single JSON object matching this schema:
{schema}"#;

/// Prompt for reading a checkbox group from a page.
pub const CHECKBOX_PROMPT: &str = r#"You are reading one page of a form.

Find the checkbox group for: {target}
{cardinality_rule}
{hints_section}
Only report boxes that are visibly checked, using the printed label next to each box.
Set "continue_next_page" to true only if the group visibly continues on the next page.

Respond with a single JSON object matching this schema:
{schema}"#;

/// Prompt for summarizing page content.
pub const SUMMARY_PROMPT: &str = r#"You are reading one page of a document.

Summarize: {target}
{section_rule}
{prev_section}
Be factual and concise. Do not repeat content that is already summarized.
If nothing relevant is on this page, return an empty summary.
Set "continue_next_page" to true only if the relevant content continues on the next page.

Respond with a single JSON object matching this schema:
{schema}"#;

/// Prompt for extracting table rows from a page.
pub const TABLE_PROMPT: &str = r#"You are reading one page of a document.

Extract the table: {target}
{columns_rule}
Return one entry in "rows" per table row, with cells in column order. Use null for empty cells.
If the table is not on this page, return no rows.
Set "continue_next_page" to true only if the table visibly continues on the next page.

Respond with a single JSON object matching this schema:
{schema}"#;

/// Prompt for composing a summary from other fields' results.
pub const COMPOSITION_PROMPT: &str = r#"Write a summary of: {target}

Use only the extracted fields below. Each block starts with the field name.

{inputs}

Respond with a single JSON object matching this schema:
{schema}"#;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").unwrap());

/// Substitute `{name}` placeholders in one pass.
///
/// Substituted text is never rescanned, so descriptions or carried page text
/// containing placeholder-like braces come through verbatim. Unknown
/// placeholders are left as they are.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            values
                .iter()
                .find(|(name, _)| *name == &caps[1])
                .map_or_else(|| caps[0].to_string(), |(_, value)| value.to_string())
        })
        .into_owned()
}

/// Pretty-printed JSON schema for a generation type.
pub fn generation_schema<T: JsonSchema>() -> String {
    serde_json::to_string_pretty(&schema_for!(T)).unwrap_or_default()
}

/// What the model is asked to find: the description, or the field name.
pub fn target_of(field: &FieldSpec) -> &str {
    if field.description.trim().is_empty() {
        &field.name
    } else {
        &field.description
    }
}

fn previous_section(label: &str, prev_context: &str) -> String {
    if prev_context.trim().is_empty() {
        String::new()
    } else {
        format!(
            "{} from the previous page(s):\n\"\"\"\n{}\n\"\"\"\nContinue from where it left off.\n",
            label, prev_context
        )
    }
}

/// Format the key-value prompt.
pub fn format_key_value_prompt(field: &FieldSpec, prev_context: &str) -> String {
    let line_rule = if field.allow_multi_line {
        "The value may span several lines; keep its line breaks."
    } else {
        "The value is a single line."
    };

    fill_template(
        KEY_VALUE_PROMPT,
        &[
            ("target", target_of(field)),
            ("line_rule", line_rule),
            ("prev_section", previous_section("Value so far", prev_context).as_str()),
            ("schema", generation_schema::<KeyValueGeneration>().as_str()),
        ],
    )
}

/// Format the bullet-points prompt.
pub fn format_bullet_points_prompt(field: &FieldSpec) -> String {
    fill_template(
        BULLET_POINTS_PROMPT,
        &[
            ("target", target_of(field)),
            ("schema", generation_schema::<BulletPointsGeneration>().as_str()),
        ],
    )
}

/// Format the checkbox prompt, with detector hints if any.
pub fn format_checkbox_prompt(field: &FieldSpec, detections: &[DetectedCheckbox]) -> String {
    let cardinality_rule = match field.checkbox_cardinality {
        Some(CheckboxCardinality::Multi) => {
            concat!(
                "Several boxes may be checked. ",
                "Report them in \"selected_options\" (an empty list if none)."
            )
        }
        _ => {
            "At most one box should be checked. Report it in \"selected_option\" (null if none)."
        }
    };

    let hints_section = if detections.is_empty() {
        String::new()
    } else {
        let lines = detections
            .iter()
            .map(|d| {
                format!(
                    "- {} at ({:.0}, {:.0}): {} (confidence {:.2})",
                    d.label,
                    d.bounding_box.x1,
                    d.bounding_box.y1,
                    if d.is_selected { "checked" } else { "unchecked" },
                    d.confidence
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        format!("A checkbox detector found these marks (left to right):\n{}\n", lines)
    };

    fill_template(
        CHECKBOX_PROMPT,
        &[
            ("target", target_of(field)),
            ("cardinality_rule", cardinality_rule),
            ("hints_section", hints_section.as_str()),
            ("schema", generation_schema::<CheckboxGeneration>().as_str()),
        ],
    )
}

/// Format the page summary prompt.
pub fn format_summary_prompt(field: &FieldSpec, prev_context: &str) -> String {
    let section_rule = match &field.section_name {
        Some(section) => format!(
            "Only summarize the section titled \"{}\" and report that title as \"section\".",
            section
        ),
        None => String::new(),
    };

    fill_template(
        SUMMARY_PROMPT,
        &[
            ("target", target_of(field)),
            ("section_rule", section_rule.as_str()),
            ("prev_section", previous_section("Summary", prev_context).as_str()),
            ("schema", generation_schema::<SummaryGeneration>().as_str()),
        ],
    )
}

/// Format the table prompt. `columns` are hints or the header seen so far.
pub fn format_table_prompt(field: &FieldSpec, columns: &[String]) -> String {
    let columns_rule = if columns.is_empty() {
        "Report the column headers as printed.".to_string()
    } else {
        format!(
            "Use exactly these columns, in this order: {}",
            columns.join(", ")
        )
    };

    fill_template(
        TABLE_PROMPT,
        &[
            ("target", target_of(field)),
            ("columns_rule", columns_rule.as_str()),
            ("schema", generation_schema::<TableGeneration>().as_str()),
        ],
    )
}

/// Format the composition prompt over the flattened inputs.
pub fn format_composition_prompt(field: &FieldSpec, inputs: &str) -> String {
    fill_template(
        COMPOSITION_PROMPT,
        &[
            ("target", target_of(field)),
            ("inputs", inputs),
            ("schema", generation_schema::<SummaryGeneration>().as_str()),
        ],
    )
}
