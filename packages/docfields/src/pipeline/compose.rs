//! Parent composition - summaries built from other fields' results.

use tracing::{debug, warn};

use crate::error::{ExtractionError, Result};
use crate::pipeline::parse::{parse_generation, SummaryGeneration};
use crate::pipeline::prompts::format_composition_prompt;
use crate::stores::ResultRegistry;
use crate::traits::generator::Generator;
use crate::types::field::FieldSpec;

/// Flattened dependency results, ready for the composition prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedInput {
    /// `### name` blocks separated by blank lines, in `depends_on` order
    pub text: String,

    /// Source field names, in `depends_on` order
    pub sources: Vec<String>,
}

/// Gather a field's dependency results from the registry.
///
/// A dependency without a published result is an `UnresolvedDependency`.
pub fn compose(field: &FieldSpec, registry: &ResultRegistry) -> Result<ComposedInput> {
    let mut blocks = Vec::with_capacity(field.depends_on.len());
    for dependency in &field.depends_on {
        let result = registry
            .get(dependency)
            .ok_or_else(|| ExtractionError::UnresolvedDependency {
                field: field.name.clone(),
                dependency: dependency.clone(),
            })?;
        blocks.push(format!("### {}\n{}", dependency, result.flattened_text()));
    }

    Ok(ComposedInput {
        text: blocks.join("\n\n"),
        sources: field.depends_on.clone(),
    })
}

/// Run the single-shot composition call.
///
/// An unparseable answer yields an empty summary; an inference failure is
/// returned as an error.
pub async fn summarize_composed<G: Generator>(
    generator: &G,
    field: &FieldSpec,
    input: &ComposedInput,
) -> Result<String> {
    let prompt = format_composition_prompt(field, &input.text);
    let raw = generator.complete(&prompt).await?;

    match parse_generation::<SummaryGeneration>(&raw) {
        Ok(generation) => {
            let (_, text) = generation.into_parts();
            debug!(field = %field.name, sources = ?input.sources, "Composed summary");
            Ok(text)
        }
        Err(e) => {
            warn!(
                field = %field.name,
                error = %e,
                "Composition output unparseable, using empty summary"
            );
            Ok(String::new())
        }
    }
}
