//! Result builders - turning aggregated fragments into validated results.
//!
//! Builders are pure and deterministic. Fragments arrive in ascending page
//! order; list kinds arrive already indexed.

use tracing::warn;

use crate::error::{ExtractionError, Result};
use crate::types::field::CheckboxCardinality;
use crate::types::fragment::{KeyValueFragment, SummaryFragment, TableFragment};
use crate::types::result::{
    BulletPointsResult, CheckboxResult, FieldResult, IndexedValue, KeyValueDetail,
    KeyValueResult, PageRange, SummaryResult, TableResult,
};

/// Concatenate key-value fragments in page order.
///
/// `normalized_value` is the concatenation of the fragments that carry one,
/// or absent if none do. Per-page detail is attached only for multi-page
/// fields. No fragments yields an empty value.
pub fn build_key_value(
    field_name: &str,
    key: &str,
    fragments: &[KeyValueFragment],
    allow_multi_page: bool,
) -> FieldResult {
    let value: String = fragments.iter().map(|f| f.value.as_str()).collect();

    let normalized: Vec<&str> = fragments
        .iter()
        .filter_map(|f| f.normalized_value.as_deref())
        .collect();
    let normalized_value = (!normalized.is_empty()).then(|| normalized.concat());

    let multipage_detail = allow_multi_page.then(|| {
        fragments
            .iter()
            .map(|f| KeyValueDetail {
                page_number: f.page_number,
                value: f.value.clone(),
                normalized_value: f.normalized_value.clone(),
            })
            .collect()
    });

    FieldResult::KeyValue(KeyValueResult {
        field_name: field_name.to_string(),
        key: key.to_string(),
        value,
        normalized_value,
        page_number: fragments.first().map(|f| f.page_number),
        multipage_detail,
    })
}

/// Wrap indexed bullet points. With `require_points`, an empty list fails.
pub fn build_bullet_points(
    field_name: &str,
    key: &str,
    points: Vec<IndexedValue>,
    require_points: bool,
) -> Result<FieldResult> {
    if require_points && points.is_empty() {
        return Err(ExtractionError::validation(
            field_name,
            "no bullet points were extracted",
        ));
    }

    Ok(FieldResult::BulletPoints(BulletPointsResult {
        field_name: field_name.to_string(),
        key: key.to_string(),
        value: points,
    }))
}

/// Wrap indexed checkbox selections. An empty selection is valid.
///
/// A single-cardinality field with several selections is rejected when
/// `enforce_single` is set and only logged otherwise.
pub fn build_checkbox(
    field_name: &str,
    key: &str,
    cardinality: CheckboxCardinality,
    selected: Vec<IndexedValue>,
    enforce_single: bool,
) -> Result<FieldResult> {
    if cardinality == CheckboxCardinality::Single && selected.len() > 1 {
        if enforce_single {
            return Err(ExtractionError::validation(
                field_name,
                format!("single checkbox has {} selections", selected.len()),
            ));
        }
        warn!(
            field = %field_name,
            selections = selected.len(),
            "Single checkbox has multiple selections"
        );
    }

    Ok(FieldResult::Checkbox(CheckboxResult {
        field_name: field_name.to_string(),
        key: key.to_string(),
        cardinality,
        value: selected,
    }))
}

/// Join page summaries with newlines.
///
/// The page range covers the pages that contributed text. The section is
/// the first one the model reported, else `section_name`.
pub fn build_summary(
    field_name: &str,
    key: &str,
    fragments: &[SummaryFragment],
    section_name: Option<&str>,
) -> FieldResult {
    let value = fragments
        .iter()
        .map(|f| f.text.trim())
        .collect::<Vec<_>>()
        .join("\n");

    let pages: Vec<u32> = fragments.iter().map(|f| f.page_number).collect();
    let section = fragments
        .iter()
        .find_map(|f| f.section.clone())
        .or_else(|| section_name.map(str::to_string));

    FieldResult::Summary(SummaryResult {
        field_name: field_name.to_string(),
        key: key.to_string(),
        value,
        section,
        page_range: PageRange::covering(&pages),
        related_fields: Vec::new(),
    })
}

/// Wrap a summary composed from other fields.
pub fn build_composed_summary(
    field_name: &str,
    key: &str,
    text: String,
    related_fields: Vec<String>,
) -> FieldResult {
    FieldResult::Summary(SummaryResult {
        field_name: field_name.to_string(),
        key: key.to_string(),
        value: text.trim().to_string(),
        section: None,
        page_range: None,
        related_fields,
    })
}

/// Append table rows across pages.
///
/// Columns come from the first fragment that reported any, else from the
/// hints. Rows may be empty. `scanned_pages` are the pages the loop visited.
pub fn build_table(
    field_name: &str,
    key: &str,
    fragments: &[TableFragment],
    column_hints: &[String],
    scanned_pages: &[u32],
) -> FieldResult {
    let columns = fragments
        .iter()
        .map(|f| &f.columns)
        .find(|c| !c.is_empty())
        .cloned()
        .unwrap_or_else(|| column_hints.to_vec());

    let rows = fragments.iter().flat_map(|f| f.rows.iter().cloned()).collect();

    FieldResult::Table(TableResult {
        field_name: field_name.to_string(),
        key: key.to_string(),
        columns,
        rows,
        page_numbers: scanned_pages.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fragment::{index_points, BulletPointsFragment};

    fn kv(page: u32, value: &str, normalized: Option<&str>) -> KeyValueFragment {
        KeyValueFragment {
            page_number: page,
            value: value.into(),
            normalized_value: normalized.map(str::to_string),
            continue_next_page: true,
        }
    }

    #[test]
    fn test_key_value_multi_page_concatenation() {
        let result = build_key_value("name", "Name", &[kv(1, "AB", None), kv(2, "CD", None)], true);
        let FieldResult::KeyValue(r) = result else {
            panic!("expected key-value result");
        };

        assert_eq!(r.value, "ABCD");
        assert_eq!(r.page_number, Some(1));
        assert_eq!(r.normalized_value, None);
        let detail = r.multipage_detail.unwrap();
        assert_eq!(detail.len(), 2);
        assert_eq!(detail[1].page_number, 2);
        assert_eq!(detail[1].value, "CD");
    }

    #[test]
    fn test_key_value_single_page_has_no_detail() {
        let result = build_key_value("amount", "Amount", &[kv(3, "$1,000", Some("1000"))], false);
        let FieldResult::KeyValue(r) = result else {
            panic!("expected key-value result");
        };
        assert_eq!(r.normalized_value.as_deref(), Some("1000"));
        assert!(r.multipage_detail.is_none());
    }

    #[test]
    fn test_key_value_partial_normalization() {
        let result = build_key_value(
            "n",
            "k",
            &[kv(1, "a", Some("A")), kv(2, "b", None), kv(3, "c", Some("C"))],
            true,
        );
        let FieldResult::KeyValue(r) = result else {
            panic!("expected key-value result");
        };
        assert_eq!(r.normalized_value.as_deref(), Some("AC"));
    }

    #[test]
    fn test_key_value_empty_never_fails() {
        let result = build_key_value("n", "k", &[], true);
        let FieldResult::KeyValue(r) = result else {
            panic!("expected key-value result");
        };
        assert_eq!(r.value, "");
        assert_eq!(r.page_number, None);
        assert_eq!(r.multipage_detail, Some(vec![]));
    }

    #[test]
    fn test_bullet_points_indices() {
        let fragments = vec![
            BulletPointsFragment {
                page_number: 1,
                points: vec!["a".into(), "b".into()],
                continue_next_page: true,
            },
            BulletPointsFragment {
                page_number: 2,
                points: vec!["c".into(), "d".into()],
                continue_next_page: false,
            },
        ];

        let result = build_bullet_points("b", "k", index_points(&fragments), true).unwrap();
        let FieldResult::BulletPoints(r) = result else {
            panic!("expected bullet points");
        };
        let indices: Vec<usize> = r.value.iter().map(|v| v.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_empty_bullet_points() {
        let err = build_bullet_points("b", "k", vec![], true).unwrap_err();
        assert!(matches!(err, ExtractionError::Validation { .. }));

        assert!(build_bullet_points("b", "k", vec![], false).is_ok());
    }

    #[test]
    fn test_checkbox_empty_is_valid() {
        let result = build_checkbox("c", "k", CheckboxCardinality::Multi, vec![], true).unwrap();
        let FieldResult::Checkbox(r) = result else {
            panic!("expected checkbox");
        };
        assert!(r.value.is_empty());

        let json = serde_json::to_value(FieldResult::Checkbox(r)).unwrap();
        assert_eq!(json["value"], serde_json::json!([]));
    }

    #[test]
    fn test_single_checkbox_enforcement() {
        let two = vec![
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
        ];

        assert!(build_checkbox("c", "k", CheckboxCardinality::Single, two.clone(), false).is_ok());
        assert!(build_checkbox("c", "k", CheckboxCardinality::Single, two, true).is_err());
    }

    #[test]
    fn test_summary_join_and_range() {
        let fragments = vec![
            SummaryFragment {
                page_number: 2,
                section: None,
                text: "First part.".into(),
                continue_next_page: true,
            },
            SummaryFragment {
                page_number: 4,
                section: Some("Terms".into()),
                text: "Second part. ".into(),
                continue_next_page: false,
            },
        ];

        let FieldResult::Summary(r) = build_summary("s", "k", &fragments, None) else {
            panic!("expected summary");
        };
        assert_eq!(r.value, "First part.\nSecond part.");
        assert_eq!(r.page_range, Some(PageRange { start: 2, end: 4 }));
        assert_eq!(r.section.as_deref(), Some("Terms"));
    }

    #[test]
    fn test_table_columns_fall_back_to_hints() {
        let fragments = vec![TableFragment {
            page_number: 5,
            columns: vec![],
            rows: vec![vec!["Origination".into(), "500".into()]],
            continue_next_page: false,
        }];
        let hints = vec!["Fee".to_string(), "Amount".to_string()];

        let FieldResult::Table(r) = build_table("t", "k", &fragments, &hints, &[5]) else {
            panic!("expected table");
        };
        assert_eq!(r.columns, hints);
        assert_eq!(r.rows.len(), 1);
        assert_eq!(r.page_numbers, vec![5]);
    }
}
