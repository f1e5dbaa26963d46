//! Settings loaded from the environment, overridable by flags.

use anyhow::{Context, Result};
use docfields::ExtractionConfig;
use std::env;

/// CLI settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub top_k: usize,
    pub query_separator: String,
}

impl Default for Settings {
    fn default() -> Self {
        let config = ExtractionConfig::default();
        Self {
            top_k: config.top_k,
            query_separator: config.query_separator,
        }
    }
}

impl Settings {
    /// Load settings from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(top_k) = lookup("DOCFIELDS_TOP_K") {
            settings.top_k = top_k
                .trim()
                .parse()
                .context("DOCFIELDS_TOP_K must be a non-negative integer")?;
        }
        if let Some(separator) = lookup("DOCFIELDS_QUERY_SEPARATOR") {
            settings.query_separator = separator;
        }

        Ok(settings)
    }

    /// Apply command-line overrides.
    pub fn with_overrides(mut self, top_k: Option<usize>, query_separator: Option<String>) -> Self {
        if let Some(top_k) = top_k {
            self.top_k = top_k;
        }
        if let Some(separator) = query_separator {
            self.query_separator = separator;
        }
        self
    }

    pub fn extraction_config(&self) -> ExtractionConfig {
        ExtractionConfig::default()
            .with_top_k(self.top_k)
            .with_query_separator(self.query_separator.clone())
    }
}
