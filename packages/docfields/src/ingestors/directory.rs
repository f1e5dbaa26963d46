//! Ingestor for documents already rendered to page images on disk.

use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

use crate::error::{ExtractionError, Result};
use crate::traits::ingestor::DocumentIngestor;
use crate::types::page::{Page, PageImage};

/// Reads a directory of page images.
///
/// Every `*.png`, `*.jpg` or `*.jpeg` file whose stem ends in a number is a
/// page (`page-1.png`, `scan_002.jpg`, `3.png`). Other files are ignored.
/// Pages are returned sorted by that number.
#[derive(Debug, Clone, Default)]
pub struct DirectoryIngestor;

impl DirectoryIngestor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentIngestor for DirectoryIngestor {
    type Document = Path;

    async fn ingest(&self, document: &Path) -> Result<Vec<Page>> {
        let mut entries = tokio::fs::read_dir(document)
            .await
            .map_err(|e| ExtractionError::Ingestion(Box::new(e)))?;

        let mut found = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ExtractionError::Ingestion(Box::new(e)))?
        {
            let path = entry.path();
            let Some(media_type) = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(media_type_for)
            else {
                continue;
            };
            let Some(page_number) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(trailing_number)
            else {
                continue;
            };
            found.push((page_number, path, media_type));
        }

        found.sort_by_key(|(n, _, _)| *n);

        let mut pages = Vec::with_capacity(found.len());
        for (page_number, path, media_type) in found {
            let data = tokio::fs::read(&path)
                .await
                .map_err(|e| ExtractionError::Ingestion(Box::new(e)))?;
            debug!(
                page = page_number,
                path = %path.display(),
                bytes = data.len(),
                "Read page image"
            );
            pages.push(Page::new(page_number, PageImage::new(data, media_type)));
        }

        Ok(pages)
    }
}

fn media_type_for(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}

fn trailing_number(stem: &str) -> Option<u32> {
    let digits_start = stem
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    stem[digits_start..].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_number() {
        assert_eq!(trailing_number("page-1"), Some(1));
        assert_eq!(trailing_number("scan_002"), Some(2));
        assert_eq!(trailing_number("12"), Some(12));
        assert_eq!(trailing_number("cover"), None);
        assert_eq!(trailing_number("v2-final"), None);
    }

    #[tokio::test]
    async fn test_ingest_sorted_numeric() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page-10.png"), b"ten").unwrap();
        std::fs::write(dir.path().join("page-2.JPG"), b"two").unwrap();
        std::fs::write(dir.path().join("page-1.png"), b"one").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();
        std::fs::write(dir.path().join("cover.png"), b"ignored").unwrap();

        let pages = DirectoryIngestor::new().ingest(dir.path()).await.unwrap();
        let numbers: Vec<u32> = pages.iter().map(|p| p.page_number).collect();
        assert_eq!(numbers, vec![1, 2, 10]);
        assert_eq!(pages[1].image.media_type, "image/jpeg");
        assert_eq!(&*pages[0].image.data, b"one");
    }

    #[tokio::test]
    async fn test_missing_directory_is_ingestion_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DirectoryIngestor::new()
            .ingest(&dir.path().join("absent"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Ingestion(_)));
    }

    #[tokio::test]
    async fn test_unreadable_page_is_ingestion_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page-1.png"), b"one").unwrap();
        // A directory with a page-like name cannot be read as a file
        std::fs::create_dir(dir.path().join("page-2.png")).unwrap();

        let err = DirectoryIngestor::new().ingest(dir.path()).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Ingestion(_)));
        assert!(err.is_fatal());
    }
}
