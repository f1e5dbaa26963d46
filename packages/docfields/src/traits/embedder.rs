//! Embedding service contract.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::page::PageImage;

/// Maps page images and text queries into a shared vector space.
///
/// All vectors from one embedder must have the same dimensionality;
/// retrieval reports a mismatch as an embedding error.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a rendered page.
    async fn embed_image(&self, image: &PageImage) -> Result<Vec<f32>>;

    /// Embed a retrieval query.
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;
}
