//! Page retrieval by embedding similarity.
//!
//! Ranks every page in the store against a field's query and keeps the top
//! `k`. Page embeddings are computed on first use and cached on the page.

use futures::future::try_join_all;
use std::cmp::Ordering;
use tracing::debug;

use crate::error::{ExtractionError, Result};
use crate::stores::PageStore;
use crate::traits::embedder::Embedder;
use crate::types::config::{ExtractionConfig, Similarity};
use crate::types::field::{FieldSpec, SummaryScope};

/// Calculate cosine similarity between two vectors.
///
/// Returns 0.0 for empty or mismatched inputs and for zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Plain dot product.
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

impl Similarity {
    /// Score `page` against `query`.
    pub fn score(&self, query: &[f32], page: &[f32]) -> f32 {
        match self {
            Self::Cosine => cosine_similarity(query, page),
            Self::Dot => dot_product(query, page),
        }
    }
}

/// Retrieval query for a field: its search phrases joined by `separator`,
/// or its description when it has none.
pub fn query_text(field: &FieldSpec, separator: &str) -> String {
    let phrases: Vec<&str> = field
        .search_phrases
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect();

    if !phrases.is_empty() {
        return phrases.join(separator);
    }

    let description = field.description.trim();
    match (&field.summary_scope, &field.section_name) {
        (Some(SummaryScope::NamedSection), Some(section)) if description.is_empty() => {
            section.trim().to_string()
        }
        _ => description.to_string(),
    }
}

/// Where a field's candidate pages come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSource {
    /// The field's fixed page list
    Explicit(Vec<u32>),

    /// Every page of the document
    WholeDocument,

    /// Top-k embedding retrieval for `query`
    Retrieval { query: String, k: usize },

    /// Other fields' results; no pages are scanned
    Composed(Vec<String>),
}

/// Decide how a field's candidate pages are chosen.
pub fn plan_pages(field: &FieldSpec, config: &ExtractionConfig) -> PageSource {
    if field.composes_from_fields() {
        return PageSource::Composed(field.depends_on.clone());
    }
    if let Some(pages) = &field.explicit_pages {
        return PageSource::Explicit(pages.clone());
    }
    if field.summary_scope == Some(SummaryScope::WholeDocument) {
        return PageSource::WholeDocument;
    }
    PageSource::Retrieval {
        query: query_text(field, &config.query_separator),
        k: field.top_k_override().unwrap_or(config.top_k),
    }
}

/// Keep the `k` best pages: descending score, ties by ascending page number.
///
/// NaN scores rank below everything else.
pub fn rank_pages(mut scored: Vec<(u32, f32)>, k: usize) -> Vec<u32> {
    for (_, score) in scored.iter_mut() {
        if score.is_nan() {
            *score = f32::NEG_INFINITY;
        }
    }

    scored.sort_by(|(page_a, score_a), (page_b, score_b)| {
        score_b
            .partial_cmp(score_a)
            .unwrap_or(Ordering::Equal)
            .then(page_a.cmp(page_b))
    });

    scored.into_iter().take(k).map(|(page, _)| page).collect()
}

/// Ranks pages of a store against text queries.
pub struct Retriever<'a, E: Embedder> {
    embedder: &'a E,
    similarity: Similarity,
}

impl<'a, E: Embedder> Retriever<'a, E> {
    pub fn new(embedder: &'a E, similarity: Similarity) -> Self {
        Self {
            embedder,
            similarity,
        }
    }

    /// Compute every missing page embedding concurrently.
    pub async fn warm(&self, store: &PageStore) -> Result<()> {
        let embedder = self.embedder;
        try_join_all(store.pages().map(|page| {
            page.embedding_or_try_init(move || embedder.embed_image(&page.image))
        }))
        .await?;

        debug!(pages = store.len(), "Warmed page embeddings");
        Ok(())
    }

    /// Score every page against `query`.
    pub async fn score_pages(&self, store: &PageStore, query: &str) -> Result<Vec<(u32, f32)>> {
        let query_embedding = self.embedder.embed_text(query).await?;

        let mut scored = Vec::with_capacity(store.len());
        for page in store.pages() {
            let embedding = page
                .embedding_or_try_init(|| self.embedder.embed_image(&page.image))
                .await?;

            if embedding.len() != query_embedding.len() {
                return Err(ExtractionError::Embedding(
                    format!(
                        "dimension mismatch: query has {}, page {} has {}",
                        query_embedding.len(),
                        page.page_number,
                        embedding.len()
                    )
                    .into(),
                ));
            }

            scored.push((page.page_number, self.similarity.score(&query_embedding, embedding)));
        }

        Ok(scored)
    }

    /// The `k` most relevant page numbers, best first.
    ///
    /// `k` larger than the document returns every page.
    pub async fn top_pages(&self, store: &PageStore, query: &str, k: usize) -> Result<Vec<u32>> {
        if k == 0 || store.is_empty() {
            return Ok(Vec::new());
        }

        let scored = self.score_pages(store, query).await?;
        let top = rank_pages(scored, k);

        debug!(query = %query, k, pages = ?top, "Retrieved pages");
        Ok(top)
    }
}
