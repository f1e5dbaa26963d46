//! Field extractors and the shared multi-page continuation loop.
//!
//! Each kind supplies a [`PageStep`]: how to prompt for one page, how to turn
//! the model's answer into a fragment, and what context to carry to the next
//! page. [`scan_pages`] runs that step over the candidate pages:
//!
//! - pages are visited in ascending order, whatever order retrieval ranked them in
//! - a page whose inference or parsing fails is logged and skipped
//! - empty fragments are dropped and never stop the loop
//! - the loop stops after the first kept fragment unless the field allows
//!   multiple pages, and otherwise as soon as a fragment does not continue

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ExtractionError, Result};
use crate::pipeline::build;
use crate::pipeline::parse::{
    parse_generation, BulletPointsGeneration, CheckboxGeneration, KeyValueGeneration,
    SummaryGeneration, TableGeneration,
};
use crate::pipeline::prompts;
use crate::stores::PageStore;
use crate::traits::detector::{sort_detections, CheckboxDetector, DetectedCheckbox};
use crate::traits::generator::Generator;
use crate::types::config::ExtractionConfig;
use crate::types::field::{CheckboxCardinality, FieldKind, FieldSpec};
use crate::types::fragment::{
    index_points, union_selections, BulletPointsFragment, CheckboxFragment, Fragment, Fragments,
    KeyValueFragment, SummaryFragment, TableFragment,
};
use crate::types::page::Page;
use crate::types::result::FieldResult;

/// Collaborators the per-page loop needs.
pub struct PageContext<'a, G: Generator> {
    pub store: &'a PageStore,
    pub generator: &'a G,
    pub detector: Option<&'a dyn CheckboxDetector>,
}

/// Fragments from one field's scan plus which pages were touched.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub fragments: Fragments,

    /// Pages an inference call was made for, ascending
    pub visited: Vec<u32>,

    /// Visited pages whose output was unusable
    pub failed: Vec<u32>,
}

/// Per-page behavior of one field kind.
pub trait PageStep {
    type Fragment: Fragment;

    /// Whether prompts should include checkbox detector hints.
    const USES_DETECTIONS: bool = false;

    /// Prompt for the next page, given what has been carried so far.
    fn prompt(&self, field: &FieldSpec, detections: &[DetectedCheckbox]) -> String;

    /// Turn raw model output for `page_number` into a fragment.
    fn parse(&self, page_number: u32, raw: &str) -> Result<Self::Fragment>;

    /// Fold a kept fragment into the carried context.
    fn carry(&mut self, fragment: &Self::Fragment);
}

/// Result of running a [`PageStep`] over candidate pages.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome<F> {
    pub fragments: Vec<F>,
    pub visited: Vec<u32>,
    pub failed: Vec<u32>,
}

impl<F> Default for ScanOutcome<F> {
    fn default() -> Self {
        Self {
            fragments: Vec::new(),
            visited: Vec::new(),
            failed: Vec::new(),
        }
    }
}

/// Run the continuation protocol for one field.
///
/// Never fails: unusable pages are recorded in `failed` and skipped.
pub async fn scan_pages<S, G>(
    step: &mut S,
    field: &FieldSpec,
    candidates: &[u32],
    ctx: &PageContext<'_, G>,
) -> ScanOutcome<S::Fragment>
where
    S: PageStep,
    G: Generator,
{
    let mut pages = candidates.to_vec();
    pages.sort_unstable();
    pages.dedup();

    let mut outcome = ScanOutcome::default();

    for page_number in pages {
        let Some(page) = ctx.store.get(page_number) else {
            warn!(
                field = %field.name,
                page = page_number,
                "Candidate page not in document, skipping"
            );
            continue;
        };
        outcome.visited.push(page_number);

        let detections = if S::USES_DETECTIONS {
            detect(ctx.detector, page).await
        } else {
            Vec::new()
        };

        let prompt = step.prompt(field, &detections);
        let fragment = match ctx.generator.generate(&page.image, &prompt).await {
            Ok(raw) => step.parse(page_number, &raw),
            Err(e) => Err(ExtractionError::PageExtraction {
                page: page_number,
                reason: e.to_string(),
            }),
        };

        let fragment = match fragment {
            Ok(fragment) => fragment,
            Err(e) => {
                warn!(
                    field = %field.name,
                    page = page_number,
                    error = %e,
                    "Page extraction failed, skipping"
                );
                outcome.failed.push(page_number);
                continue;
            }
        };

        if fragment.is_empty() {
            debug!(field = %field.name, page = page_number, "Nothing found on page");
            continue;
        }

        let continues = fragment.continue_next_page();
        step.carry(&fragment);
        outcome.fragments.push(fragment);
        debug!(field = %field.name, page = page_number, continues, "Kept fragment");

        if !field.allow_multi_page || !continues {
            break;
        }
    }

    outcome
}

/// Detector hints for one page, sorted. Detector failures are logged and ignored.
async fn detect(detector: Option<&dyn CheckboxDetector>, page: &Page) -> Vec<DetectedCheckbox> {
    let Some(detector) = detector else {
        return Vec::new();
    };

    match detector.detect(&page.image).await {
        Ok(mut detections) => {
            sort_detections(&mut detections);
            detections
        }
        Err(e) => {
            warn!(
                page = page.page_number,
                error = %e,
                "Checkbox detection failed, continuing without hints"
            );
            Vec::new()
        }
    }
}

fn page_error(page: u32, error: impl std::fmt::Display) -> ExtractionError {
    ExtractionError::PageExtraction {
        page,
        reason: error.to_string(),
    }
}

/// Key-value pages; carries the running concatenation of values.
#[derive(Debug, Default)]
pub struct KeyValueStep {
    prev: String,
}

impl PageStep for KeyValueStep {
    type Fragment = KeyValueFragment;

    fn prompt(&self, field: &FieldSpec, _: &[DetectedCheckbox]) -> String {
        prompts::format_key_value_prompt(field, &self.prev)
    }

    fn parse(&self, page_number: u32, raw: &str) -> Result<KeyValueFragment> {
        let gen: KeyValueGeneration =
            parse_generation(raw).map_err(|e| page_error(page_number, e))?;
        Ok(KeyValueFragment {
            page_number,
            value: gen.value,
            normalized_value: gen.normalized_value.filter(|v| !v.trim().is_empty()),
            continue_next_page: gen.continue_next_page,
        })
    }

    fn carry(&mut self, fragment: &KeyValueFragment) {
        self.prev.push_str(&fragment.value);
    }
}

/// Bullet-point pages; nothing is carried.
#[derive(Debug, Default)]
pub struct BulletPointsStep;

impl PageStep for BulletPointsStep {
    type Fragment = BulletPointsFragment;

    fn prompt(&self, field: &FieldSpec, _: &[DetectedCheckbox]) -> String {
        prompts::format_bullet_points_prompt(field)
    }

    fn parse(&self, page_number: u32, raw: &str) -> Result<BulletPointsFragment> {
        let gen: BulletPointsGeneration =
            parse_generation(raw).map_err(|e| page_error(page_number, e))?;
        Ok(BulletPointsFragment {
            page_number,
            points: gen.points,
            continue_next_page: gen.continue_next_page,
        })
    }

    fn carry(&mut self, _: &BulletPointsFragment) {}
}

/// Checkbox pages; prompts include detector hints.
#[derive(Debug, Default)]
pub struct CheckboxStep;

impl PageStep for CheckboxStep {
    type Fragment = CheckboxFragment;

    const USES_DETECTIONS: bool = true;

    fn prompt(&self, field: &FieldSpec, detections: &[DetectedCheckbox]) -> String {
        prompts::format_checkbox_prompt(field, detections)
    }

    fn parse(&self, page_number: u32, raw: &str) -> Result<CheckboxFragment> {
        let value: Value = parse_generation(raw).map_err(|e| page_error(page_number, e))?;
        let gen: CheckboxGeneration =
            serde_json::from_value(value.clone()).map_err(|e| page_error(page_number, e))?;
        let continue_next_page = gen.continue_next_page;
        let selected = gen
            .into_selected(&value)
            .map_err(|reason| page_error(page_number, reason))?;

        Ok(CheckboxFragment {
            page_number,
            selected,
            continue_next_page,
        })
    }

    fn carry(&mut self, _: &CheckboxFragment) {}
}

/// Page summaries; carries the newline-joined prior summaries.
#[derive(Debug, Default)]
pub struct SummaryStep {
    prev: Vec<String>,
}

impl PageStep for SummaryStep {
    type Fragment = SummaryFragment;

    fn prompt(&self, field: &FieldSpec, _: &[DetectedCheckbox]) -> String {
        prompts::format_summary_prompt(field, &self.prev.join("\n"))
    }

    fn parse(&self, page_number: u32, raw: &str) -> Result<SummaryFragment> {
        let gen: SummaryGeneration =
            parse_generation(raw).map_err(|e| page_error(page_number, e))?;
        let continue_next_page = gen.continue_next_page;
        let (section, text) = gen.into_parts();
        Ok(SummaryFragment {
            page_number,
            section,
            text,
            continue_next_page,
        })
    }

    fn carry(&mut self, fragment: &SummaryFragment) {
        self.prev.push(fragment.text.trim().to_string());
    }
}

/// Table pages; carries the column header so continuation pages keep it.
#[derive(Debug, Default)]
pub struct TableStep {
    columns: Vec<String>,
}

impl TableStep {
    pub fn with_columns(columns: Vec<String>) -> Self {
        Self { columns }
    }
}

impl PageStep for TableStep {
    type Fragment = TableFragment;

    fn prompt(&self, field: &FieldSpec, _: &[DetectedCheckbox]) -> String {
        prompts::format_table_prompt(field, &self.columns)
    }

    fn parse(&self, page_number: u32, raw: &str) -> Result<TableFragment> {
        let gen: TableGeneration =
            parse_generation(raw).map_err(|e| page_error(page_number, e))?;
        let rows = gen.text_rows();
        let columns = if gen.columns.is_empty() {
            self.columns.clone()
        } else {
            gen.columns
        };
        Ok(TableFragment {
            page_number,
            columns,
            rows,
            continue_next_page: gen.continue_next_page,
        })
    }

    fn carry(&mut self, fragment: &TableFragment) {
        if self.columns.is_empty() {
            self.columns = fragment.columns.clone();
        }
    }
}

/// Static dispatch over the five field kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldExtractor {
    KeyValue,
    BulletPoints,
    Checkbox(CheckboxCardinality),
    Summary,
    Table,
}

impl FieldExtractor {
    /// The extractor for a field's kind.
    pub fn for_field(field: &FieldSpec) -> Self {
        match field.kind {
            FieldKind::KeyValue => Self::KeyValue,
            FieldKind::BulletPoints => Self::BulletPoints,
            FieldKind::Checkbox => Self::Checkbox(
                field
                    .checkbox_cardinality
                    .unwrap_or(CheckboxCardinality::Single),
            ),
            FieldKind::Summary => Self::Summary,
            FieldKind::Table => Self::Table,
        }
    }

    /// Scan `candidates` and aggregate the fragments.
    pub async fn extract<G: Generator>(
        &self,
        field: &FieldSpec,
        candidates: &[u32],
        ctx: &PageContext<'_, G>,
    ) -> Extraction {
        fn finish<F>(
            outcome: ScanOutcome<F>,
            wrap: impl FnOnce(Vec<F>) -> Fragments,
        ) -> Extraction {
            Extraction {
                fragments: wrap(outcome.fragments),
                visited: outcome.visited,
                failed: outcome.failed,
            }
        }

        match self {
            Self::KeyValue => {
                let mut step = KeyValueStep::default();
                let outcome = scan_pages(&mut step, field, candidates, ctx).await;
                finish(outcome, Fragments::KeyValue)
            }
            Self::BulletPoints => {
                let outcome = scan_pages(&mut BulletPointsStep, field, candidates, ctx).await;
                finish(outcome, |f| Fragments::BulletPoints(index_points(&f)))
            }
            Self::Checkbox(_) => {
                let outcome = scan_pages(&mut CheckboxStep, field, candidates, ctx).await;
                finish(outcome, |f| Fragments::Checkbox(union_selections(&f)))
            }
            Self::Summary => {
                let outcome = scan_pages(&mut SummaryStep::default(), field, candidates, ctx).await;
                finish(outcome, Fragments::Summary)
            }
            Self::Table => {
                let mut step = TableStep::with_columns(field.column_hints());
                let outcome = scan_pages(&mut step, field, candidates, ctx).await;
                finish(outcome, Fragments::Table)
            }
        }
    }

    /// Build the validated result from an extraction.
    pub fn build(
        &self,
        field: &FieldSpec,
        key: &str,
        extraction: Extraction,
        config: &ExtractionConfig,
    ) -> Result<FieldResult> {
        let name = field.name.as_str();
        match (self, extraction.fragments) {
            (Self::KeyValue, Fragments::KeyValue(f)) => {
                Ok(build::build_key_value(name, key, &f, field.allow_multi_page))
            }
            (Self::BulletPoints, Fragments::BulletPoints(points)) => {
                build::build_bullet_points(name, key, points, config.require_bullet_points)
            }
            (Self::Checkbox(cardinality), Fragments::Checkbox(selected)) => build::build_checkbox(
                name,
                key,
                *cardinality,
                selected,
                config.enforce_single_checkbox,
            ),
            (Self::Summary, Fragments::Summary(f)) => Ok(build::build_summary(
                name,
                key,
                &f,
                field.section_name.as_deref(),
            )),
            (Self::Table, Fragments::Table(f)) => Ok(build::build_table(
                name,
                key,
                &f,
                &field.column_hints(),
                &extraction.visited,
            )),
            (_, other) => Err(ExtractionError::validation(
                name,
                format!("{} fragments cannot build a {:?} result", other.len(), self),
            )),
        }
    }
}
