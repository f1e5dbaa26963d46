//! Per-run state: the page store and the result registry.
//!
//! Both are created fresh by every `ExtractionSession::run` call and never
//! shared between runs.

pub mod page_store;
pub mod registry;

pub use page_store::PageStore;
pub use registry::ResultRegistry;
