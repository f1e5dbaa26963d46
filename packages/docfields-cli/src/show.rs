//! `docfields show`: print a persisted extraction output.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use docfields::ExtractionOutput;
use serde_json::Value;
use std::fmt::Write;
use std::path::Path;

pub fn read_output(path: &Path) -> Result<ExtractionOutput> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read output from {}", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("{} is not an extraction output document", path.display()))
}

/// Flat view of the output, optionally narrowed to one field.
pub fn render_output(output: &ExtractionOutput, field: Option<&str>) -> Result<String> {
    let by_field = output.by_field();
    let mut out = String::new();

    if let Some(name) = field {
        if let Some(value) = by_field.get(name) {
            let _ = writeln!(out, "{}", display_value(value));
            return Ok(out);
        }
        if let Some(failure) = output.errors.iter().find(|f| f.field_name == name) {
            let _ = writeln!(out, "{} {}", failure.kind.red(), failure.message);
            return Ok(out);
        }
        bail!("Field '{}' is not in run {}", name, output.run_id);
    }

    let _ = writeln!(out, "{} {}", "Run".bold(), output.run_id);
    for (name, value) in &by_field {
        let _ = writeln!(out, "{}: {}", name.green(), display_value(value));
    }
    if !output.errors.is_empty() {
        let _ = writeln!(out, "{}", "Errors".bold().red());
        for failure in &output.errors {
            let _ = writeln!(
                out,
                "{}: {} ({})",
                failure.field_name.yellow(),
                failure.message,
                failure.kind
            );
        }
    }

    Ok(out)
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        Value::Array(items) if items.is_empty() => "-".to_string(),
        Value::Array(items) if items.iter().all(Value::is_string) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}
