//! Field results - the validated, aggregated output for one field.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::field::{CheckboxCardinality, FieldKind};

/// A list entry with its source page and global position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedValue {
    pub value: String,
    pub page_number: u32,

    /// 1-based, strictly increasing across pages
    pub index: usize,
}

/// Per-page detail of a multi-page key-value result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValueDetail {
    pub page_number: u32,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_value: Option<String>,
}

/// Inclusive page range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    /// Smallest range covering `pages`, or `None` if there are none.
    pub fn covering(pages: &[u32]) -> Option<Self> {
        let start = pages.iter().min()?;
        let end = pages.iter().max()?;
        Some(Self {
            start: *start,
            end: *end,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValueResult {
    pub field_name: String,
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub normalized_value: Option<String>,

    /// First contributing page, absent when nothing was found
    #[serde(default)]
    pub page_number: Option<u32>,

    /// Present only for multi-page fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multipage_detail: Option<Vec<KeyValueDetail>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulletPointsResult {
    pub field_name: String,
    pub key: String,
    pub value: Vec<IndexedValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckboxResult {
    pub field_name: String,
    pub key: String,
    pub cardinality: CheckboxCardinality,

    /// Selected labels; empty when nothing is checked
    pub value: Vec<IndexedValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub field_name: String,
    pub key: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_range: Option<PageRange>,

    /// Source fields of a composed summary
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableResult {
    pub field_name: String,
    pub key: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,

    /// Pages the table loop scanned
    pub page_numbers: Vec<u32>,
}

/// The final result for one field, tagged by kind in serialized form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum FieldResult {
    KeyValue(KeyValueResult),
    BulletPoints(BulletPointsResult),
    Checkbox(CheckboxResult),
    Summary(SummaryResult),
    Table(TableResult),
}

impl FieldResult {
    pub fn field_name(&self) -> &str {
        match self {
            Self::KeyValue(r) => &r.field_name,
            Self::BulletPoints(r) => &r.field_name,
            Self::Checkbox(r) => &r.field_name,
            Self::Summary(r) => &r.field_name,
            Self::Table(r) => &r.field_name,
        }
    }

    /// The query or description the field was extracted with.
    pub fn key(&self) -> &str {
        match self {
            Self::KeyValue(r) => &r.key,
            Self::BulletPoints(r) => &r.key,
            Self::Checkbox(r) => &r.key,
            Self::Summary(r) => &r.key,
            Self::Table(r) => &r.key,
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Self::KeyValue(_) => FieldKind::KeyValue,
            Self::BulletPoints(_) => FieldKind::BulletPoints,
            Self::Checkbox(_) => FieldKind::Checkbox,
            Self::Summary(_) => FieldKind::Summary,
            Self::Table(_) => FieldKind::Table,
        }
    }

    /// Plain-text rendering used when this result feeds a composed summary.
    pub fn flattened_text(&self) -> String {
        match self {
            Self::KeyValue(r) => r.value.clone(),
            Self::BulletPoints(r) => join_values(&r.value),
            Self::Checkbox(r) => join_values(&r.value),
            Self::Summary(r) => r.value.clone(),
            Self::Table(r) => {
                let mut lines = Vec::with_capacity(r.rows.len() + 1);
                if !r.columns.is_empty() {
                    lines.push(r.columns.join(" | "));
                }
                lines.extend(r.rows.iter().map(|row| row.join(" | ")));
                lines.join("\n")
            }
        }
    }

    /// Bare value for the flat `{field_name: value}` view.
    pub fn plain_value(&self) -> Value {
        match self {
            Self::KeyValue(r) => json!(r.value),
            Self::BulletPoints(r) => json!(r.value.iter().map(|v| &v.value).collect::<Vec<_>>()),
            // Always the label list; single cardinality is advisory
            Self::Checkbox(r) => json!(r.value.iter().map(|v| &v.value).collect::<Vec<_>>()),
            Self::Summary(r) => json!(r.value),
            Self::Table(r) => json!({ "columns": r.columns, "rows": r.rows }),
        }
    }
}

fn join_values(values: &[IndexedValue]) -> String {
    values
        .iter()
        .map(|v| v.value.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indexed(values: &[&str]) -> Vec<IndexedValue> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| IndexedValue {
                value: v.to_string(),
                page_number: 1,
                index: i + 1,
            })
            .collect()
    }

    #[test]
    fn test_serialized_shape_is_tagged() {
        let result = FieldResult::KeyValue(KeyValueResult {
            field_name: "borrower".into(),
            key: "Borrower name".into(),
            value: "Jane Doe".into(),
            normalized_value: None,
            page_number: Some(1),
            multipage_detail: None,
        });

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["type"], "key-value");
        assert_eq!(value["field_name"], "borrower");
        assert_eq!(value["page_number"], 1);
        assert!(value.get("multipage_detail").is_none());

        let back: FieldResult = serde_json::from_value(value).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_flattened_text_per_kind() {
        let points = FieldResult::BulletPoints(BulletPointsResult {
            field_name: "b".into(),
            key: "k".into(),
            value: indexed(&["one", "two"]),
        });
        assert_eq!(points.flattened_text(), "one\ntwo");

        let table = FieldResult::Table(TableResult {
            field_name: "t".into(),
            key: "k".into(),
            columns: vec!["Fee".into(), "Amount".into()],
            rows: vec![vec!["Origination".into(), "$500".into()]],
            page_numbers: vec![3],
        });
        assert_eq!(table.flattened_text(), "Fee | Amount\nOrigination | $500");
    }

    #[test]
    fn test_plain_value_checkbox_is_label_list() {
        let empty = FieldResult::Checkbox(CheckboxResult {
            field_name: "c".into(),
            key: "k".into(),
            cardinality: CheckboxCardinality::Single,
            value: vec![],
        });
        assert_eq!(empty.plain_value(), json!([]));

        let two = FieldResult::Checkbox(CheckboxResult {
            field_name: "c".into(),
            key: "k".into(),
            cardinality: CheckboxCardinality::Single,
            value: vec![
                IndexedValue {
                    value: "Yes".into(),
                    page_number: 1,
                    index: 1,
                },
                IndexedValue {
                    value: "No".into(),
                    page_number: 1,
                    index: 2,
                },
            ],
        });
        assert_eq!(two.plain_value(), json!(["Yes", "No"]));

        let multi = FieldResult::Checkbox(CheckboxResult {
            field_name: "c".into(),
            key: "k".into(),
            cardinality: CheckboxCardinality::Multi,
            value: vec![],
        });
        assert_eq!(multi.plain_value(), json!([]));
    }

    #[test]
    fn test_page_range_covering() {
        assert_eq!(PageRange::covering(&[]), None);
        assert_eq!(
            PageRange::covering(&[4, 2, 3]),
            Some(PageRange { start: 2, end: 4 })
        );
    }
}
