//! Per-run page storage.

use std::collections::BTreeMap;

use crate::error::{ExtractionError, Result};
use crate::types::page::Page;

/// Ordered mapping page number -> page.
///
/// Populated once from an ingestor's output and read-only afterwards, apart
/// from each page's lazily computed embedding.
#[derive(Debug, Default)]
pub struct PageStore {
    pages: BTreeMap<u32, Page>,
}

impl PageStore {
    /// Build a store from ingested pages.
    ///
    /// Pages must be numbered 1, 2, 3, ... in order with no gaps or repeats;
    /// anything else is an ingestion error.
    pub fn from_pages(pages: Vec<Page>) -> Result<Self> {
        let mut store = BTreeMap::new();
        for (idx, page) in pages.into_iter().enumerate() {
            let expected = idx as u32 + 1;
            if page.page_number != expected {
                return Err(ExtractionError::Ingestion(
                    format!(
                        "page numbering must be contiguous from 1: expected {}, got {}",
                        expected, page.page_number
                    )
                    .into(),
                ));
            }
            store.insert(page.page_number, page);
        }
        Ok(Self { pages: store })
    }

    pub fn get(&self, page_number: u32) -> Option<&Page> {
        self.pages.get(&page_number)
    }

    pub fn contains(&self, page_number: u32) -> bool {
        self.pages.contains_key(&page_number)
    }

    /// Pages in ascending order.
    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        self.pages.values()
    }

    /// All page numbers in ascending order.
    pub fn page_numbers(&self) -> Vec<u32> {
        self.pages.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}
