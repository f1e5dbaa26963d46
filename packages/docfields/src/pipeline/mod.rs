//! Extraction pipeline - the core of the library.
//!
//! The pipeline orchestrates:
//! - Dependency ordering of the field set
//! - Page retrieval by embedding similarity
//! - Per-page extraction with the multi-page continuation loop
//! - Composition of summaries from other fields
//! - Result building and validation

pub mod build;
pub mod compose;
pub mod extract;
pub mod parse;
pub mod prompts;
pub mod resolve;
pub mod retrieve;
pub mod session;

pub use compose::{compose, summarize_composed, ComposedInput};
pub use extract::{scan_pages, Extraction, FieldExtractor, PageContext, PageStep, ScanOutcome};
pub use parse::{extract_json_object, parse_generation};
pub use resolve::order_fields;
pub use retrieve::{cosine_similarity, plan_pages, query_text, rank_pages, PageSource, Retriever};
pub use session::{result_key, ExtractionOutput, ExtractionRun, ExtractionSession};
