//! The single boilerplate pattern set used when rebuilding article bodies.

use crate::config::ExtractorConfig;
use crate::error::ConfigError;
use regex::RegexSet;

/// Case-insensitive patterns for text blocks that are never article content
/// ("leia também", "advertisement", sharing prompts, ...).
#[derive(Debug, Clone)]
pub struct BoilerplateFilter {
    patterns: RegexSet,
}

impl BoilerplateFilter {
    pub fn new<I, S>(patterns: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = RegexSet::new(
            patterns
                .into_iter()
                .map(|p| format!("(?i){}", p.as_ref())),
        )?;
        Ok(Self { patterns })
    }

    pub fn from_config(config: &ExtractorConfig) -> Result<Self, ConfigError> {
        Self::new(&config.boilerplate_patterns)
    }

    pub fn is_boilerplate(&self, text: &str) -> bool {
        self.patterns.is_match(text.trim())
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
