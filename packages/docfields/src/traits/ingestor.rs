//! Document ingestion - turning a source document into numbered page images.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::page::Page;

/// Renders a document into pages.
///
/// Implementations must return pages numbered 1, 2, 3, ... in ascending
/// order with no gaps. The session enforces this and treats a violation as
/// a fatal ingestion error.
///
/// # Example
///
/// ```rust,ignore
/// let pages = ingestor.ingest(Path::new("scans/loan-42")).await?;
/// assert_eq!(pages[0].page_number, 1);
/// ```
#[async_trait]
pub trait DocumentIngestor: Send + Sync {
    /// The document handle this ingestor accepts (a path, bytes, a URL, ...).
    type Document: ?Sized + Sync;

    /// Produce the document's pages in order.
    async fn ingest(&self, document: &Self::Document) -> Result<Vec<Page>>;
}
