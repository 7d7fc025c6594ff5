// Scoring Context
// Validated configuration with every pattern compiled once, shared by all detectors

use regex::Regex;
use std::collections::{BTreeMap, HashSet};

use crate::services::config_store::{
    compile_pattern, ConfigError, ScoringConfig, ThresholdConfig, WeightConfig,
};

#[derive(Debug, Clone)]
pub struct CompiledFamily {
    pub name: String,
    pub patterns: Vec<Regex>,
}

/// Immutable, constructor-injected configuration for one scoring process.
#[derive(Debug, Clone)]
pub struct ScoringContext {
    config: ScoringConfig,
    telltale_phrases: Vec<String>,
    hedging_words: HashSet<String>,
    formal_transitions: HashSet<String>,
    connectors: Vec<String>,
    signatures: BTreeMap<String, Vec<CompiledFamily>>,
}

impl ScoringContext {
    pub fn new(config: ScoringConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let lower = |items: &[String]| -> Vec<String> {
            items
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        };

        let mut signatures = BTreeMap::new();
        for (country, families) in &config.patterns.linguistic_signatures {
            let mut compiled = Vec::with_capacity(families.len());
            for family in families {
                let context = format!("{}/{}", country, family.name);
                let patterns = family
                    .patterns
                    .iter()
                    .map(|p| compile_pattern(p, &context))
                    .collect::<Result<Vec<_>, _>>()?;
                compiled.push(CompiledFamily {
                    name: family.name.clone(),
                    patterns,
                });
            }
            signatures.insert(country.to_ascii_lowercase(), compiled);
        }

        Ok(Self {
            telltale_phrases: lower(&config.patterns.telltale_phrases),
            hedging_words: lower(&config.patterns.hedging_words).into_iter().collect(),
            formal_transitions: lower(&config.patterns.formal_transitions)
                .into_iter()
                .collect(),
            connectors: lower(&config.patterns.connectors),
            signatures,
            config,
        })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.config.thresholds
    }

    pub fn weights(&self) -> &WeightConfig {
        &self.config.weights
    }

    pub fn telltale_phrases(&self) -> &[String] {
        &self.telltale_phrases
    }

    pub fn is_hedging_word(&self, word: &str) -> bool {
        self.hedging_words.contains(word)
    }

    pub fn is_formal_transition(&self, word: &str) -> bool {
        self.formal_transitions.contains(word)
    }

    pub fn connectors(&self) -> &[String] {
        &self.connectors
    }

    pub fn signatures_for(&self, country: &str) -> Option<&[CompiledFamily]> {
        self.signatures
            .get(&country.trim().to_ascii_lowercase())
            .map(|v| v.as_slice())
    }
}

impl Default for ScoringContext {
    fn default() -> Self {
        // Built-in defaults always validate; covered by the config tests.
        Self::new(ScoringConfig::default()).expect("default scoring config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_context_compiles_all_countries() {
        let ctx = ScoringContext::default();
        for country in ["united_states", "taiwan", "italy", "indonesia"] {
            let families = ctx.signatures_for(country).unwrap();
            assert!(families.len() >= 2, "{country} needs several families");
        }
        assert!(ctx.signatures_for("atlantis").is_none());
        assert!(ctx.signatures_for(" Taiwan ").is_some());
    }

    #[test]
    fn test_word_lists_are_lowercased() {
        let mut config = ScoringConfig::default();
        config.patterns.hedging_words = vec!["Perhaps".to_string()];
        let ctx = ScoringContext::new(config).unwrap();
        assert!(ctx.is_hedging_word("perhaps"));
        assert!(!ctx.is_hedging_word("might"));
    }
}
