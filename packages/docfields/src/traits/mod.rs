//! Collaborator contracts for the extraction library.
//!
//! These traits define the external services an application supplies:
//! document ingestion, embeddings, generative inference and (optionally)
//! checkbox detection.

pub mod detector;
pub mod embedder;
pub mod generator;
pub mod ingestor;

pub use detector::{BoundingBox, CheckboxDetector, DetectedCheckbox};
pub use embedder::Embedder;
pub use generator::Generator;
pub use ingestor::DocumentIngestor;
