//! Ingestor implementations.
//!
//! - `DirectoryIngestor` - pre-rendered page images in a directory
//! - `MockIngestor` (in [`crate::testing`]) - canned pages for tests

mod directory;

pub use directory::DirectoryIngestor;

// Re-export from traits for convenience
pub use crate::traits::ingestor::DocumentIngestor;
