//! Field Extraction from Multi-Page Documents
//!
//! Extracts structured fields (key-value pairs, bullet lists, checkbox
//! selections, summaries, tables) from documents by combining page-level
//! embedding retrieval with per-page generative extraction.
//!
//! # Design
//!
//! - Fields are declared, not coded: a JSON array of field specs drives a run
//! - Fields may consume other fields' results (composed summaries), so the
//!   set is ordered by dependency before anything is extracted
//! - Each field reads only the few pages retrieval ranks highest
//! - Pages are scanned in order with a bounded continuation protocol
//! - A failing field never takes down independent fields
//! - The library handles orchestration; models are supplied by the caller
//!   through the [`traits`]
//!
//! # Usage
//!
//! ```rust,ignore
//! use docfields::{load_field_specs, DirectoryIngestor, ExtractionSession};
//!
//! let fields = load_field_specs(&std::fs::read_to_string("fields.json")?)?;
//! let session = ExtractionSession::new(DirectoryIngestor::new(), embedder, generator);
//!
//! let run = session.run(&fields, Path::new("scans/loan-42")).await?;
//! for failure in &run.failures {
//!     eprintln!("{}: {}", failure.field_name, failure.message);
//! }
//! run.write_output(Path::new("loan-42.json"))?;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Collaborator contracts (ingestion, embeddings, generation, detection)
//! - [`types`] - Field specs, pages, fragments, results, configuration
//! - [`pipeline`] - Ordering, retrieval, extraction, composition, building, sessions
//! - [`stores`] - Per-run page store and result registry
//! - [`ingestors`] - Ingestor implementations
//! - [`testing`] - Mock implementations for testing

pub mod error;
pub mod ingestors;
pub mod pipeline;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

#[cfg(feature = "openai")]
pub mod ai;

// Re-export core types at crate root
pub use error::{ExtractionError, FieldFailure, Result};
pub use traits::{
    BoundingBox, CheckboxDetector, DetectedCheckbox, DocumentIngestor, Embedder, Generator,
};
pub use types::{
    config::{ExtractionConfig, Similarity},
    field::{
        load_field_specs, validate_field_set, CheckboxCardinality, FieldKind, FieldSpec,
        SummaryScope,
    },
    page::{Page, PageImage},
    result::{
        BulletPointsResult, CheckboxResult, FieldResult, IndexedValue, KeyValueDetail,
        KeyValueResult, PageRange, SummaryResult, TableResult,
    },
};

// Re-export the session and pipeline entry points
pub use pipeline::{
    order_fields, plan_pages, query_text, ExtractionOutput, ExtractionRun, ExtractionSession,
    FieldExtractor, PageSource, Retriever,
};

// Re-export stores
pub use stores::{PageStore, ResultRegistry};

// Re-export ingestors
pub use ingestors::DirectoryIngestor;

// Re-export testing utilities
pub use testing::{MockDetector, MockEmbedder, MockGenerator, MockIngestor, TestScenario};
