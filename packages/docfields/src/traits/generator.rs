//! Generative inference contract.
//!
//! The extraction loop only needs two calls: a vision call that answers a
//! prompt about one page image, and a text-only call used when a summary is
//! composed from other fields' results. Both return raw model text; parsing
//! into typed generations happens in the pipeline.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::page::PageImage;

/// Vision-language model used for per-page extraction.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Generator: Send + Sync {
    /// Answer `prompt` about a single page image.
    async fn generate(&self, image: &PageImage, prompt: &str) -> Result<String>;

    /// Answer a text-only prompt.
    async fn complete(&self, prompt: &str) -> Result<String>;
}
