//! Result registry - the per-run, append-only map of published results.

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{ExtractionError, Result};
use crate::types::result::FieldResult;

/// Published field results for one run, in publication order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultRegistry {
    results: IndexMap<String, FieldResult>,
}

impl ResultRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a result. Each field name may be published once.
    pub fn publish(&mut self, result: FieldResult) -> Result<()> {
        let name = result.field_name().to_string();
        if self.results.contains_key(&name) {
            return Err(ExtractionError::DuplicateResult { field: name });
        }
        self.results.insert(name, result);
        Ok(())
    }

    pub fn get(&self, field_name: &str) -> Option<&FieldResult> {
        self.results.get(field_name)
    }

    pub fn contains(&self, field_name: &str) -> bool {
        self.results.contains_key(field_name)
    }

    /// Results in publication order.
    pub fn results(&self) -> impl Iterator<Item = &FieldResult> {
        self.results.values()
    }

    /// Flat `{field_name: value}` view.
    pub fn by_field(&self) -> IndexMap<String, Value> {
        self.results
            .iter()
            .map(|(name, result)| (name.clone(), result.plain_value()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Consume the registry, yielding results in publication order.
    pub fn into_results(self) -> Vec<FieldResult> {
        self.results.into_values().collect()
    }
}
