//! The extraction session - main entry point of the library.
//!
//! A session holds the collaborators and configuration. Each call to
//! [`ExtractionSession::run`] owns its own page store and result registry, so
//! one session can serve many documents, concurrently if the caller wishes.
//!
//! Per run:
//! 1. validate the field set
//! 2. ingest the document into a fresh page store
//! 3. order the fields by dependency
//! 4. per field: pick candidate pages, extract (or compose), build, publish
//!
//! A failing field is recorded and the run moves on; fields depending on it
//! are marked failed without being attempted.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{ExtractionError, FieldFailure, Result};
use crate::pipeline::build::build_composed_summary;
use crate::pipeline::compose::{compose, summarize_composed};
use crate::pipeline::extract::{FieldExtractor, PageContext};
use crate::pipeline::resolve::order_fields;
use crate::pipeline::retrieve::{plan_pages, query_text, PageSource, Retriever};
use crate::stores::{PageStore, ResultRegistry};
use crate::traits::{CheckboxDetector, DocumentIngestor, Embedder, Generator};
use crate::types::config::ExtractionConfig;
use crate::types::field::{validate_field_set, FieldSpec};
use crate::types::result::FieldResult;

/// Runs field extraction over documents.
///
/// # Example
///
/// ```rust,ignore
/// let session = ExtractionSession::new(DirectoryIngestor::new(), embedder, generator)
///     .with_config(ExtractionConfig::default().with_top_k(4));
///
/// let fields = load_field_specs(&std::fs::read_to_string("fields.json")?)?;
/// let run = session.run(&fields, Path::new("scans/loan-42")).await?;
///
/// println!("{}", serde_json::to_string_pretty(&run.output())?);
/// ```
pub struct ExtractionSession<I: DocumentIngestor, E: Embedder, G: Generator> {
    ingestor: I,
    embedder: E,
    generator: G,
    detector: Option<Box<dyn CheckboxDetector>>,
    config: ExtractionConfig,
}

impl<I: DocumentIngestor, E: Embedder, G: Generator> ExtractionSession<I, E, G> {
    /// Create a session with the default configuration and no detector.
    pub fn new(ingestor: I, embedder: E, generator: G) -> Self {
        Self {
            ingestor,
            embedder,
            generator,
            detector: None,
            config: ExtractionConfig::default(),
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: ExtractionConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a checkbox detector for checkbox prompts.
    pub fn with_detector(mut self, detector: impl CheckboxDetector + 'static) -> Self {
        self.detector = Some(Box::new(detector));
        self
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn ingestor(&self) -> &I {
        &self.ingestor
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Extract every field from one document.
    ///
    /// Errors are run-fatal only (invalid specs, ingestion, ordering);
    /// field failures are reported in [`ExtractionRun::failures`].
    pub async fn run(&self, fields: &[FieldSpec], document: &I::Document) -> Result<ExtractionRun> {
        self.run_with_cancel(fields, document, &CancellationToken::new())
            .await
    }

    /// Like [`run`](Self::run), checking `cancel` before each field.
    ///
    /// A field in progress always finishes; cancellation returns `Cancelled`.
    pub async fn run_with_cancel(
        &self,
        fields: &[FieldSpec],
        document: &I::Document,
        cancel: &CancellationToken,
    ) -> Result<ExtractionRun> {
        let run_id = Uuid::now_v7();
        let started_at = Utc::now();
        info!(run_id = %run_id, fields = fields.len(), "Starting extraction run");

        validate_field_set(fields)?;

        if cancel.is_cancelled() {
            return Err(ExtractionError::Cancelled);
        }

        let store = PageStore::from_pages(self.ingestor.ingest(document).await?)?;
        debug!(run_id = %run_id, pages = store.len(), "Ingested document");

        let ordered = order_fields(fields)?;

        let retriever = Retriever::new(&self.embedder, self.config.similarity);
        if self.config.warm_page_embeddings && fields.iter().any(FieldSpec::needs_retrieval) {
            if let Err(e) = retriever.warm(&store).await {
                warn!(
                    run_id = %run_id,
                    error = %e,
                    "Embedding warm-up failed, falling back to lazy embeddings"
                );
            }
        }

        let mut registry = ResultRegistry::new();
        let mut failures = Vec::new();
        let mut failed: HashSet<&str> = HashSet::new();

        for field in ordered {
            if cancel.is_cancelled() {
                info!(run_id = %run_id, published = registry.len(), "Extraction run cancelled");
                return Err(ExtractionError::Cancelled);
            }

            if let Some(dependency) = field
                .depends_on
                .iter()
                .find(|d| failed.contains(d.as_str()))
            {
                let err = ExtractionError::DependencyFailed {
                    field: field.name.clone(),
                    dependency: dependency.clone(),
                };
                warn!(
                    field = %field.name,
                    dependency = %dependency,
                    "Skipping field with failed dependency"
                );
                failures.push(FieldFailure::new(&field.name, &err));
                failed.insert(&field.name);
                continue;
            }

            let outcome = match self
                .process_field(field, &store, &registry, &retriever)
                .await
            {
                Ok(result) => registry.publish(result),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(()) => info!(field = %field.name, kind = %field.kind, "Published field"),
                Err(e) => {
                    warn!(field = %field.name, error = %e, "Field failed");
                    failures.push(FieldFailure::new(&field.name, &e));
                    failed.insert(&field.name);
                }
            }
        }

        let finished_at = Utc::now();
        info!(
            run_id = %run_id,
            published = registry.len(),
            failed = failures.len(),
            elapsed_ms = (finished_at - started_at).num_milliseconds(),
            "Extraction run complete"
        );

        Ok(ExtractionRun {
            run_id,
            registry,
            failures,
            page_count: store.len(),
            started_at,
            finished_at,
        })
    }

    /// Pick pages, extract (or compose) and build one field's result.
    #[instrument(skip_all, fields(field = %field.name, kind = %field.kind))]
    async fn process_field(
        &self,
        field: &FieldSpec,
        store: &PageStore,
        registry: &ResultRegistry,
        retriever: &Retriever<'_, E>,
    ) -> Result<FieldResult> {
        let key = result_key(field, &self.config);

        let candidates = match plan_pages(field, &self.config) {
            PageSource::Composed(_) => {
                let input = compose(field, registry)?;
                let text = summarize_composed(&self.generator, field, &input).await?;
                return Ok(build_composed_summary(&field.name, &key, text, input.sources));
            }
            PageSource::Explicit(pages) => pages,
            PageSource::WholeDocument => store.page_numbers(),
            PageSource::Retrieval { query, k } => retriever.top_pages(store, &query, k).await?,
        };
        debug!(candidates = ?candidates, "Candidate pages");

        let ctx = PageContext {
            store,
            generator: &self.generator,
            detector: self.detector.as_deref(),
        };
        let extractor = FieldExtractor::for_field(field);
        let extraction = extractor.extract(field, &candidates, &ctx).await;

        if !extraction.failed.is_empty() {
            debug!(failed_pages = ?extraction.failed, "Some pages were unusable");
        }

        extractor.build(field, &key, extraction, &self.config)
    }
}

/// The `key` recorded on a result: the retrieval query, or the name.
pub fn result_key(field: &FieldSpec, config: &ExtractionConfig) -> String {
    let query = query_text(field, &config.query_separator);
    if query.is_empty() {
        field.name.clone()
    } else {
        query
    }
}

/// Everything one run produced.
#[derive(Debug, Clone)]
pub struct ExtractionRun {
    pub run_id: Uuid,

    /// Published results, in resolved order
    pub registry: ResultRegistry,

    /// Fields that did not produce a result
    pub failures: Vec<FieldFailure>,

    pub page_count: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExtractionRun {
    /// The persisted output document.
    pub fn output(&self) -> ExtractionOutput {
        ExtractionOutput {
            run_id: self.run_id,
            results: self.registry.results().cloned().collect(),
            errors: self.failures.clone(),
        }
    }

    /// Write the output document as pretty JSON to `path`.
    pub fn write_output(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self.output()).map_err(io::Error::from)?;
        writer.flush()?;
        debug!(run_id = %self.run_id, path = %path.display(), "Wrote extraction output");
        Ok(())
    }

    pub fn result(&self, field_name: &str) -> Option<&FieldResult> {
        self.registry.get(field_name)
    }

    pub fn failure(&self, field_name: &str) -> Option<&FieldFailure> {
        self.failures.iter().find(|f| f.field_name == field_name)
    }
}

/// Serialized form of a run: `{run_id, results, errors}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub run_id: Uuid,
    pub results: Vec<FieldResult>,
    #[serde(default)]
    pub errors: Vec<FieldFailure>,
}

impl ExtractionOutput {
    /// Flat `{field_name: value}` view.
    pub fn by_field(&self) -> IndexMap<String, Value> {
        self.results
            .iter()
            .map(|r| (r.field_name().to_string(), r.plain_value()))
            .collect()
    }
}
