//! Page types - rendered page images and their cached embeddings.

use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// A rendered page image.
///
/// Bytes are shared, so cloning a handle is cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    /// Encoded image bytes
    pub data: Arc<[u8]>,

    /// MIME type of `data` (e.g. `image/png`)
    pub media_type: String,
}

impl PageImage {
    /// Create a new image handle.
    pub fn new(data: impl Into<Arc<[u8]>>, media_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            media_type: media_type.into(),
        }
    }

    /// A PNG image handle.
    pub fn png(data: impl Into<Arc<[u8]>>) -> Self {
        Self::new(data, "image/png")
    }

    /// SHA-256 hash of the image bytes.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.data);
        format!("{:x}", hasher.finalize())
    }

    /// Size of the encoded image in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the image has no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// One page of an ingested document.
///
/// The embedding is computed at most once, on first use, and never changes
/// afterwards.
#[derive(Debug)]
pub struct Page {
    /// 1-based page number
    pub page_number: u32,

    /// Rendered image
    pub image: PageImage,

    embedding: OnceCell<Vec<f32>>,
}

impl Page {
    /// Create a page without an embedding.
    pub fn new(page_number: u32, image: PageImage) -> Self {
        Self {
            page_number,
            image,
            embedding: OnceCell::new(),
        }
    }

    /// Create a page with a precomputed embedding.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = OnceCell::new_with(Some(embedding));
        self
    }

    /// The cached embedding, if it has been computed.
    pub fn embedding(&self) -> Option<&[f32]> {
        self.embedding.get().map(Vec::as_slice)
    }

    /// Return the cached embedding, computing it with `init` on first use.
    ///
    /// Concurrent callers wait for a single initialization. A failed
    /// initialization leaves the cell empty.
    pub async fn embedding_or_try_init<F, Fut, E>(&self, init: F) -> Result<&[f32], E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Vec<f32>, E>>,
    {
        self.embedding
            .get_or_try_init(init)
            .await
            .map(Vec::as_slice)
    }
}
