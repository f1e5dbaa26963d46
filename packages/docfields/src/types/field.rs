//! Field specifications - the declarative extraction targets.
//!
//! A field set is loaded once per run (usually from a JSON array), validated
//! as a whole, and then ordered by the dependency resolver.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

use crate::error::{ExtractionError, Result};

/// What shape of value a field extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    /// A single (possibly multi-page) text value
    KeyValue,

    /// An ordered list of points
    BulletPoints,

    /// Selected checkbox labels
    Checkbox,

    /// Free-text summary over pages or over other fields
    #[serde(alias = "summarization")]
    Summary,

    /// Rows under a set of columns
    Table,
}

impl FieldKind {
    /// The kebab-case name used in field specs and output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeyValue => "key-value",
            Self::BulletPoints => "bullet-points",
            Self::Checkbox => "checkbox",
            Self::Summary => "summary",
            Self::Table => "table",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How many checkbox selections a field expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckboxCardinality {
    #[serde(alias = "single_value")]
    Single,
    #[serde(alias = "multi_value")]
    Multi,
}

/// Where a summary field draws its input from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummaryScope {
    /// Every page of the document
    #[serde(alias = "whole")]
    WholeDocument,

    /// Pages retrieved for a named section
    #[serde(alias = "section")]
    NamedSection,

    /// The field's explicit page list
    #[serde(alias = "pages")]
    ExplicitPages,

    /// Results of other fields, via the parent composer
    #[serde(alias = "fields")]
    ComposedFromFields,
}

/// One declared extraction target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFieldSpec")]
pub struct FieldSpec {
    /// Unique identifier within the field set
    pub name: String,

    /// Human-readable intent (retrieval query fallback)
    pub description: String,

    /// Retrieval phrases; when non-empty they replace `description` as the query
    pub search_phrases: Vec<String>,

    /// Selects the extractor / result builder pair
    pub kind: FieldKind,

    /// Fixed candidate pages; retrieval is skipped when set
    pub explicit_pages: Option<Vec<u32>>,

    /// Keep scanning later pages while the model signals continuation
    pub allow_multi_page: bool,

    /// The value may span several lines
    pub allow_multi_line: bool,

    /// Checkbox fields only
    pub checkbox_cardinality: Option<CheckboxCardinality>,

    /// Summary fields only
    pub summary_scope: Option<SummaryScope>,

    /// Section label for `SummaryScope::NamedSection`
    pub section_name: Option<String>,

    /// Fields whose results this field consumes
    pub depends_on: Vec<String>,

    /// Kind-specific parameters and unknown keys from the input
    pub extra: IndexMap<String, Value>,
}

impl FieldSpec {
    /// Create a new field spec with defaults.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            search_phrases: Vec::new(),
            kind,
            explicit_pages: None,
            allow_multi_page: false,
            allow_multi_line: false,
            checkbox_cardinality: None,
            summary_scope: None,
            section_name: None,
            depends_on: Vec::new(),
            extra: IndexMap::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the retrieval phrases.
    pub fn with_search_phrases(
        mut self,
        phrases: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.search_phrases = phrases.into_iter().map(|p| p.into()).collect();
        self
    }

    /// Pin the candidate pages.
    pub fn with_pages(mut self, pages: impl IntoIterator<Item = u32>) -> Self {
        self.explicit_pages = Some(pages.into_iter().collect());
        self
    }

    /// Allow continuation onto later pages.
    pub fn multi_page(mut self) -> Self {
        self.allow_multi_page = true;
        self
    }

    /// Allow multi-line values.
    pub fn multi_line(mut self) -> Self {
        self.allow_multi_line = true;
        self
    }

    /// Set the checkbox cardinality.
    pub fn with_cardinality(mut self, cardinality: CheckboxCardinality) -> Self {
        self.checkbox_cardinality = Some(cardinality);
        self
    }

    /// Set the summary scope.
    pub fn with_scope(mut self, scope: SummaryScope) -> Self {
        self.summary_scope = Some(scope);
        self
    }

    /// Set the section name (named-section summaries).
    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section_name = Some(section.into());
        self
    }

    /// Declare dependencies on other fields.
    pub fn depends_on(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.depends_on = names.into_iter().map(|n| n.into()).collect();
        self
    }

    /// Add an extra parameter.
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Whether this field is built from other fields' results instead of pages.
    pub fn composes_from_fields(&self) -> bool {
        self.kind == FieldKind::Summary
            && self.summary_scope == Some(SummaryScope::ComposedFromFields)
    }

    /// Column hints for table fields (`extra.columns`).
    pub fn column_hints(&self) -> Vec<String> {
        self.extra
            .get("columns")
            .and_then(Value::as_array)
            .map(|cols| {
                cols.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Per-field retrieval depth override (`extra.top_k`).
    pub fn top_k_override(&self) -> Option<usize> {
        self.extra
            .get("top_k")
            .and_then(Value::as_u64)
            .filter(|k| *k > 0)
            .map(|k| k as usize)
    }

    /// Whether candidate pages come from embedding retrieval.
    pub fn needs_retrieval(&self) -> bool {
        if self.explicit_pages.is_some() {
            return false;
        }
        !matches!(
            self.summary_scope,
            Some(SummaryScope::WholeDocument) | Some(SummaryScope::ComposedFromFields)
        )
    }

    /// Check this spec in isolation.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: &str| Err(ExtractionError::spec(&self.name, reason));

        if self.name.trim().is_empty() {
            return fail("name must not be empty");
        }

        match (self.kind, self.checkbox_cardinality) {
            (FieldKind::Checkbox, None) => return fail("checkbox fields need checkbox_cardinality"),
            (FieldKind::Checkbox, Some(_)) | (_, None) => {}
            (_, Some(_)) => return fail("checkbox_cardinality only applies to checkbox fields"),
        }

        match (self.kind, self.summary_scope) {
            (FieldKind::Summary, None) => return fail("summary fields need summary_scope"),
            (FieldKind::Summary, Some(_)) | (_, None) => {}
            (_, Some(_)) => return fail("summary_scope only applies to summary fields"),
        }

        if let Some(pages) = &self.explicit_pages {
            if pages.iter().any(|p| *p == 0) {
                return fail("explicit_pages are 1-indexed");
            }
        }

        match self.summary_scope {
            Some(SummaryScope::NamedSection)
                if self
                    .section_name
                    .as_deref()
                    .map_or(true, |s| s.trim().is_empty()) =>
            {
                return fail("named-section summaries need section_name");
            }
            Some(SummaryScope::ExplicitPages)
                if self.explicit_pages.as_ref().map_or(true, Vec::is_empty) =>
            {
                return fail("explicit-pages summaries need explicit_pages");
            }
            Some(SummaryScope::ComposedFromFields) if self.depends_on.is_empty() => {
                return fail("composed-from-fields summaries need depends_on");
            }
            _ => {}
        }

        if !self.depends_on.is_empty() && !self.composes_from_fields() {
            return fail("depends_on is only allowed for composed-from-fields summaries");
        }

        let section_query = self.summary_scope == Some(SummaryScope::NamedSection)
            && self.section_name.as_deref().is_some_and(|s| !s.trim().is_empty());
        if self.needs_retrieval()
            && self.description.trim().is_empty()
            && self.search_phrases.iter().all(|p| p.trim().is_empty())
            && !section_query
        {
            return fail("retrieval needs a description, search_phrases or section_name");
        }

        if let Some(columns) = self.extra.get("columns") {
            let valid = columns
                .as_array()
                .map_or(false, |cols| cols.iter().all(Value::is_string));
            if !valid {
                return fail("extra.columns must be an array of strings");
            }
        }

        if let Some(top_k) = self.extra.get("top_k") {
            if !top_k.as_u64().map_or(false, |k| k > 0) {
                return fail("extra.top_k must be a positive integer");
            }
        }

        Ok(())
    }
}

/// Validate a whole field set: every spec, plus name uniqueness.
///
/// Dependency references are checked by the resolver, not here.
pub fn validate_field_set(fields: &[FieldSpec]) -> Result<()> {
    let mut seen = HashSet::with_capacity(fields.len());
    for field in fields {
        field.validate()?;
        if !seen.insert(field.name.as_str()) {
            return Err(ExtractionError::spec(&field.name, "duplicate field name"));
        }
    }
    Ok(())
}

/// Parse and validate a JSON array of field specs.
pub fn load_field_specs(json: &str) -> Result<Vec<FieldSpec>> {
    let raw: Vec<Value> = serde_json::from_str(json)?;

    let mut fields = Vec::with_capacity(raw.len());
    for (idx, value) in raw.into_iter().enumerate() {
        let label = value
            .get("name")
            .or_else(|| value.get("field_name"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", idx));

        let field: FieldSpec = serde_json::from_value(value)
            .map_err(|e| ExtractionError::spec(label, e.to_string()))?;
        fields.push(field);
    }

    validate_field_set(&fields)?;
    Ok(fields)
}

/// Wire format of a field spec, before normalization.
///
/// Accepts the historical key names as aliases and keeps every unknown key.
#[derive(Deserialize)]
struct RawFieldSpec {
    #[serde(alias = "field_name")]
    name: String,

    #[serde(default)]
    description: String,

    #[serde(default, alias = "search_keys")]
    search_phrases: Vec<String>,

    #[serde(alias = "type")]
    kind: FieldKind,

    #[serde(default, alias = "probable_pages")]
    explicit_pages: Option<Vec<u32>>,

    #[serde(default, alias = "multipage_value")]
    allow_multi_page: bool,

    #[serde(default, alias = "multiline_value")]
    allow_multi_line: bool,

    #[serde(default)]
    checkbox_cardinality: Option<CheckboxCardinality>,

    #[serde(default)]
    summary_scope: Option<SummaryScope>,

    /// Historical combined key for cardinality and summary scope
    #[serde(default)]
    scope: Option<String>,

    #[serde(default)]
    section_name: Option<String>,

    #[serde(default, alias = "parent")]
    depends_on: Vec<String>,

    #[serde(flatten)]
    rest: IndexMap<String, Value>,
}

impl TryFrom<RawFieldSpec> for FieldSpec {
    type Error = ExtractionError;

    fn try_from(raw: RawFieldSpec) -> Result<Self> {
        let mut checkbox_cardinality = raw.checkbox_cardinality;
        let mut summary_scope = raw.summary_scope;

        if let Some(scope) = raw.scope.as_deref() {
            let quoted = Value::String(scope.to_string());
            match raw.kind {
                FieldKind::Checkbox if checkbox_cardinality.is_none() => {
                    let unknown = format!("unknown checkbox scope '{}'", scope);
                    checkbox_cardinality = Some(
                        serde_json::from_value(quoted)
                            .map_err(|_| ExtractionError::spec(&raw.name, unknown))?,
                    );
                }
                FieldKind::Summary if summary_scope.is_none() => {
                    let unknown = format!("unknown summary scope '{}'", scope);
                    summary_scope = Some(
                        serde_json::from_value(quoted)
                            .map_err(|_| ExtractionError::spec(&raw.name, unknown))?,
                    );
                }
                _ => {}
            }
        }

        // Nested rule maps are flattened into `extra`; explicit keys win.
        let mut extra = IndexMap::new();
        let mut explicit = IndexMap::new();
        for (key, value) in raw.rest {
            match (key.as_str(), value) {
                ("extra" | "extra_rules", Value::Object(map)) => {
                    for (k, v) in map {
                        extra.entry(k).or_insert(v);
                    }
                }
                (_, value) => {
                    explicit.insert(key, value);
                }
            }
        }
        for (key, value) in explicit {
            extra.insert(key, value);
        }

        Ok(Self {
            name: raw.name,
            description: raw.description,
            search_phrases: raw.search_phrases,
            kind: raw.kind,
            explicit_pages: raw.explicit_pages.filter(|pages| !pages.is_empty()),
            allow_multi_page: raw.allow_multi_page,
            allow_multi_line: raw.allow_multi_line,
            checkbox_cardinality,
            summary_scope,
            section_name: raw.section_name,
            depends_on: raw.depends_on,
            extra,
        })
    }
}
