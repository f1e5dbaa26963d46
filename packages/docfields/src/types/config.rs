//! Configuration for an extraction session.

use serde::{Deserialize, Serialize};

/// How a query embedding is scored against a page embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Similarity {
    /// Cosine similarity (magnitude-independent)
    #[default]
    Cosine,

    /// Raw dot product (for embedders that already normalize)
    Dot,
}

/// Configuration for the extraction session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Pages returned by retrieval per field.
    ///
    /// Overridden per field by `extra.top_k`. Default: 3.
    pub top_k: usize,

    /// Joins a field's search phrases into one retrieval query.
    ///
    /// Default: a single space.
    pub query_separator: String,

    /// Scoring function for retrieval.
    pub similarity: Similarity,

    /// Embed every page concurrently before the first retrieval.
    ///
    /// When false, page embeddings are computed lazily as retrieval
    /// touches them. Default: true.
    pub warm_page_embeddings: bool,

    /// Reject bullet-point fields that produced no points.
    ///
    /// Default: true.
    pub require_bullet_points: bool,

    /// Reject single-cardinality checkbox fields with several selections.
    ///
    /// When false, the violation is only logged. Default: false.
    pub enforce_single_checkbox: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            query_separator: " ".to_string(),
            similarity: Similarity::Cosine,
            warm_page_embeddings: true,
            require_bullet_points: true,
            enforce_single_checkbox: false,
        }
    }
}

impl ExtractionConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retrieval depth.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set the search-phrase separator.
    pub fn with_query_separator(mut self, separator: impl Into<String>) -> Self {
        self.query_separator = separator.into();
        self
    }

    /// Set the similarity function.
    pub fn with_similarity(mut self, similarity: Similarity) -> Self {
        self.similarity = similarity;
        self
    }

    /// Enable or disable concurrent embedding warm-up.
    pub fn with_warm_page_embeddings(mut self, warm: bool) -> Self {
        self.warm_page_embeddings = warm;
        self
    }

    /// Set whether empty bullet lists fail validation.
    pub fn with_require_bullet_points(mut self, require: bool) -> Self {
        self.require_bullet_points = require;
        self
    }

    /// Set whether single checkboxes with multiple selections fail validation.
    pub fn with_enforce_single_checkbox(mut self, enforce: bool) -> Self {
        self.enforce_single_checkbox = enforce;
        self
    }
}
