//! Typed errors for the field extraction library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.
//!
//! Errors fall into two groups:
//! - **Run-fatal**: spec validation, dependency ordering, ingestion and
//!   cancellation. Nothing (or nothing further) is extracted.
//! - **Field-level**: everything else. The session records the error against
//!   the field name and keeps processing independent fields.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during extraction operations.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// A field specification is malformed
    #[error("invalid field spec '{field}': {reason}")]
    SpecValidation { field: String, reason: String },

    /// A `depends_on` entry names a field that is not in the set
    #[error("field '{field}' depends on unknown field '{dependency}'")]
    MissingDependency { field: String, dependency: String },

    /// The dependency graph contains a cycle
    #[error("cyclic dependency: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// A composed field's dependency has no published result
    #[error("field '{field}' requires '{dependency}' but no result was published")]
    UnresolvedDependency { field: String, dependency: String },

    /// A dependency of this field failed, so the field was not attempted
    #[error("field '{field}' skipped: dependency '{dependency}' failed")]
    DependencyFailed { field: String, dependency: String },

    /// One page's output could not be turned into a fragment
    #[error("page {page} extraction failed: {reason}")]
    PageExtraction { page: u32, reason: String },

    /// A result builder rejected the aggregated fragments
    #[error("validation failed for '{field}': {reason}")]
    Validation { field: String, reason: String },

    /// A field name was published twice in one run
    #[error("result for '{field}' already published")]
    DuplicateResult { field: String },

    /// Document ingestion failed or broke the page-numbering contract
    #[error("ingestion error: {0}")]
    Ingestion(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Embedding generation failed
    #[error("embedding error: {0}")]
    Embedding(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Generative inference service unavailable or failed
    #[error("inference error: {0}")]
    Inference(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Checkbox detector failed
    #[error("checkbox detection error: {0}")]
    Detection(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Operation was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractionError {
    /// Shorthand for a spec validation error.
    pub fn spec(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SpecValidation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a result validation error.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error aborts the whole run rather than a single field.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SpecValidation { .. }
                | Self::MissingDependency { .. }
                | Self::CyclicDependency { .. }
                | Self::Ingestion(_)
                | Self::Cancelled
        )
    }

    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SpecValidation { .. } => "spec_validation",
            Self::MissingDependency { .. } => "missing_dependency",
            Self::CyclicDependency { .. } => "cyclic_dependency",
            Self::UnresolvedDependency { .. } => "unresolved_dependency",
            Self::DependencyFailed { .. } => "dependency_failed",
            Self::PageExtraction { .. } => "page_extraction",
            Self::Validation { .. } => "validation",
            Self::DuplicateResult { .. } => "duplicate_result",
            Self::Ingestion(_) => "ingestion",
            Self::Embedding(_) => "embedding",
            Self::Inference(_) => "inference",
            Self::Detection(_) => "detection",
            Self::Cancelled => "cancelled",
            Self::JsonParse(_) => "json_parse",
            Self::Io(_) => "io",
        }
    }
}

/// A per-field failure recorded by the session.
///
/// Serialized next to the successful results so callers get partial output
/// plus an explanation for every missing field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFailure {
    /// Name of the field that failed
    pub field_name: String,

    /// Error kind (see [`ExtractionError::kind`])
    pub kind: String,

    /// Human-readable message
    pub message: String,
}

impl FieldFailure {
    /// Record a failure for a field.
    pub fn new(field_name: impl Into<String>, error: &ExtractionError) -> Self {
        Self {
            field_name: field_name.into(),
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractionError>;
