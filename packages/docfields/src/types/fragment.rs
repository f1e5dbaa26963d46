//! Per-page fragments - raw extraction output before aggregation.
//!
//! Fragments never leave a single field's processing. The extractor collects
//! them page by page and hands them to the matching result builder.

use serde::{Deserialize, Serialize};

use super::result::IndexedValue;

/// Behavior shared by every fragment shape.
pub trait Fragment {
    /// Page this fragment came from.
    fn page_number(&self) -> u32;

    /// Whether the model signalled that the value continues on the next page.
    fn continue_next_page(&self) -> bool;

    /// Whether the fragment carries no usable content.
    ///
    /// Empty fragments are dropped by the continuation loop and do not
    /// count as the "first productive page".
    fn is_empty(&self) -> bool;
}

/// One page's key-value output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValueFragment {
    pub page_number: u32,
    pub value: String,
    pub normalized_value: Option<String>,
    pub continue_next_page: bool,
}

/// One page's bullet points, in page order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulletPointsFragment {
    pub page_number: u32,
    pub points: Vec<String>,
    pub continue_next_page: bool,
}

/// One page's checkbox selections.
///
/// An empty selection is a legitimate answer, so this fragment is never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckboxFragment {
    pub page_number: u32,
    pub selected: Vec<String>,
    pub continue_next_page: bool,
}

/// One page's summary text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryFragment {
    pub page_number: u32,

    /// Section label reported by the model, if any
    pub section: Option<String>,

    pub text: String,
    pub continue_next_page: bool,
}

/// One page's table rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableFragment {
    pub page_number: u32,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub continue_next_page: bool,
}

impl Fragment for KeyValueFragment {
    fn page_number(&self) -> u32 {
        self.page_number
    }

    fn continue_next_page(&self) -> bool {
        self.continue_next_page
    }

    fn is_empty(&self) -> bool {
        self.value.trim().is_empty()
    }
}

impl Fragment for BulletPointsFragment {
    fn page_number(&self) -> u32 {
        self.page_number
    }

    fn continue_next_page(&self) -> bool {
        self.continue_next_page
    }

    fn is_empty(&self) -> bool {
        self.points.iter().all(|p| p.trim().is_empty())
    }
}

impl Fragment for CheckboxFragment {
    fn page_number(&self) -> u32 {
        self.page_number
    }

    fn continue_next_page(&self) -> bool {
        self.continue_next_page
    }

    fn is_empty(&self) -> bool {
        false
    }
}

impl Fragment for SummaryFragment {
    fn page_number(&self) -> u32 {
        self.page_number
    }

    fn continue_next_page(&self) -> bool {
        self.continue_next_page
    }

    fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

impl Fragment for TableFragment {
    fn page_number(&self) -> u32 {
        self.page_number
    }

    fn continue_next_page(&self) -> bool {
        self.continue_next_page
    }

    fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Aggregated fragments for one field, ready for its result builder.
///
/// List kinds are already flattened into globally indexed values.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragments {
    KeyValue(Vec<KeyValueFragment>),
    BulletPoints(Vec<IndexedValue>),
    Checkbox(Vec<IndexedValue>),
    Summary(Vec<SummaryFragment>),
    Table(Vec<TableFragment>),
}

impl Fragments {
    /// Number of aggregated units.
    pub fn len(&self) -> usize {
        match self {
            Self::KeyValue(f) => f.len(),
            Self::BulletPoints(v) | Self::Checkbox(v) => v.len(),
            Self::Summary(f) => f.len(),
            Self::Table(f) => f.len(),
        }
    }

    /// Whether nothing was aggregated.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Assign global 1-based indices to bullet points across pages.
///
/// Blank points are dropped.
pub fn index_points(fragments: &[BulletPointsFragment]) -> Vec<IndexedValue> {
    fragments
        .iter()
        .flat_map(|f| {
            f.points
                .iter()
                .filter(|p| !p.trim().is_empty())
                .map(move |p| (f.page_number, p.trim().to_string()))
        })
        .enumerate()
        .map(|(i, (page_number, value))| IndexedValue {
            value,
            page_number,
            index: i + 1,
        })
        .collect()
}

/// Union checkbox selections across pages with global 1-based indices.
///
/// A label selected on several pages keeps its first occurrence.
pub fn union_selections(fragments: &[CheckboxFragment]) -> Vec<IndexedValue> {
    let mut union: Vec<IndexedValue> = Vec::new();
    for fragment in fragments {
        for label in &fragment.selected {
            let label = label.trim();
            if label.is_empty() || union.iter().any(|v| v.value == label) {
                continue;
            }
            union.push(IndexedValue {
                value: label.to_string(),
                page_number: fragment.page_number,
                index: union.len() + 1,
            });
        }
    }
    union
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(page: u32, values: &[&str]) -> BulletPointsFragment {
        BulletPointsFragment {
            page_number: page,
            points: values.iter().map(|v| v.to_string()).collect(),
            continue_next_page: true,
        }
    }

    #[test]
    fn test_points_indexed_across_pages() {
        let indexed = index_points(&[points(1, &["a", "b"]), points(2, &["c", "d"])]);
        let indices: Vec<usize> = indexed.iter().map(|v| v.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4]);
        assert_eq!(indexed[2].page_number, 2);
        assert_eq!(indexed[2].value, "c");
    }

    #[test]
    fn test_blank_points_skipped() {
        let indexed = index_points(&[points(1, &["a", "  "]), points(3, &["b"])]);
        assert_eq!(indexed.len(), 2);
        assert_eq!(indexed[1].index, 2);
        assert!(points(4, &["", " "]).is_empty());
    }

    #[test]
    fn test_checkbox_union_dedupes() {
        let fragments = vec![
            CheckboxFragment {
                page_number: 1,
                selected: vec!["Owner".into(), "Tenant".into()],
                continue_next_page: true,
            },
            CheckboxFragment {
                page_number: 2,
                selected: vec!["Tenant".into(), "Other".into()],
                continue_next_page: false,
            },
        ];

        let union = union_selections(&fragments);
        let labels: Vec<&str> = union.iter().map(|v| v.value.as_str()).collect();
        assert_eq!(labels, vec!["Owner", "Tenant", "Other"]);
        assert_eq!(union[1].page_number, 1);
        assert_eq!(union[2].index, 3);
    }

    #[test]
    fn test_empty_checkbox_fragment_is_not_empty() {
        let fragment = CheckboxFragment {
            page_number: 1,
            selected: vec![],
            continue_next_page: false,
        };
        assert!(!fragment.is_empty());
        assert!(union_selections(&[fragment]).is_empty());
    }
}
