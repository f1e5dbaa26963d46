//! `docfields plan`: load, validate and order a field set without running it.

use anyhow::{Context, Result};
use colored::Colorize;
use docfields::{
    load_field_specs, order_fields, plan_pages, ExtractionConfig, FieldSpec, PageSource,
};
use serde::Serialize;
use std::fmt::Write;
use std::path::Path;

/// One field in processing order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedField {
    pub position: usize,
    pub name: String,
    pub kind: String,
    pub pages: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

pub fn read_fields(path: &Path) -> Result<Vec<FieldSpec>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read field specs from {}", path.display()))?;
    load_field_specs(&json).with_context(|| format!("Invalid field specs in {}", path.display()))
}

pub fn build_plan(fields: &[FieldSpec], config: &ExtractionConfig) -> Result<Vec<PlannedField>> {
    let ordered = order_fields(fields).context("Failed to order fields")?;

    Ok(ordered
        .into_iter()
        .enumerate()
        .map(|(i, field)| PlannedField {
            position: i + 1,
            name: field.name.clone(),
            kind: field.kind.to_string(),
            pages: describe_source(&plan_pages(field, config)),
            depends_on: field.depends_on.clone(),
        })
        .collect())
}

pub fn describe_source(source: &PageSource) -> String {
    match source {
        PageSource::Explicit(pages) => format!(
            "pages {}",
            pages
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ),
        PageSource::WholeDocument => "whole document".to_string(),
        PageSource::Retrieval { query, k } => format!("top {} pages for \"{}\"", k, query),
        PageSource::Composed(names) => format!("composed from {}", names.join(", ")),
    }
}

pub fn render_plan(plan: &[PlannedField]) -> String {
    let mut out = String::new();
    for field in plan {
        let _ = writeln!(
            out,
            "{:>3}. {} {} {}",
            field.position,
            field.name.bold(),
            format!("[{}]", field.kind).cyan(),
            field.pages.dimmed()
        );
    }
    out
}
