// Configuration Storage Service
// Versioned scoring schema (patterns, weights, thresholds), validated at load time

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SCHEMA_VERSION: u32 = 1;
const CONFIG_FILE_NAME: &str = "scoring.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("unsupported schema version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("invalid weights: {0}")]
    InvalidWeights(String),
    #[error("invalid thresholds: {0}")]
    InvalidThresholds(String),
    #[error("invalid pattern `{pattern}` in {context}: {source}")]
    InvalidPattern {
        context: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("unknown persona `{0}`")]
    UnknownPersona(String),
    #[error("persona `{persona}` is missing required section `{section}`")]
    MissingSection { persona: String, section: String },
}

/// A named family of regex signatures for one country voice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignatureFamily {
    pub name: String,
    pub patterns: Vec<String>,
}

impl SignatureFamily {
    fn new(name: &str, patterns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatternConfig {
    #[serde(default = "default_telltale_phrases")]
    pub telltale_phrases: Vec<String>,
    #[serde(default = "default_hedging_words")]
    pub hedging_words: Vec<String>,
    #[serde(default = "default_formal_transitions")]
    pub formal_transitions: Vec<String>,
    #[serde(default = "default_connectors")]
    pub connectors: Vec<String>,
    #[serde(default = "default_linguistic_signatures")]
    pub linguistic_signatures: BTreeMap<String, Vec<SignatureFamily>>,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            telltale_phrases: default_telltale_phrases(),
            hedging_words: default_hedging_words(),
            formal_transitions: default_formal_transitions(),
            connectors: default_connectors(),
            linguistic_signatures: default_linguistic_signatures(),
        }
    }
}

/// Relative weights of the fused dimensions. Normalized at scoring time,
/// so only their ratios matter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeightConfig {
    #[serde(default = "default_external_weight")]
    pub external_detection: f64,
    #[serde(default = "default_persona_weight")]
    pub persona: f64,
    #[serde(default = "default_structural_weight")]
    pub structural: f64,
    #[serde(default = "default_legacy_weight")]
    pub legacy: f64,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            external_detection: default_external_weight(),
            persona: default_persona_weight(),
            structural: default_structural_weight(),
            legacy: default_legacy_weight(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdConfig {
    #[serde(default = "default_accept")]
    pub accept: f64,
    #[serde(default = "default_revise")]
    pub revise: f64,
    #[serde(default = "default_translate_confidence")]
    pub translate_confidence: f64,
    #[serde(default = "default_telltale_external_confidence")]
    pub telltale_external_confidence: f64,
    #[serde(default = "default_grammar_error_cap")]
    pub grammar_error_cap: f64,
    #[serde(default = "default_structural_min_sentences")]
    pub structural_min_sentences: usize,
    #[serde(default = "default_sentence_cv_min")]
    pub sentence_cv_min: f64,
    #[serde(default = "default_paragraph_cv_min")]
    pub paragraph_cv_min: f64,
    #[serde(default = "default_fragment_max_words")]
    pub fragment_max_words: usize,
    #[serde(default = "default_capitalization_min_sentences")]
    pub capitalization_min_sentences: usize,
    #[serde(default = "default_hedging_per_100")]
    pub hedging_per_100: f64,
    #[serde(default = "default_transitions_per_100")]
    pub transitions_per_100: f64,
    #[serde(default = "default_passive_ratio")]
    pub passive_ratio: f64,
    #[serde(default = "default_contraction_min_words")]
    pub contraction_min_words: usize,
    #[serde(default = "default_ttr_max")]
    pub ttr_max: f64,
    #[serde(default = "default_ttr_min_words")]
    pub ttr_min_words: usize,
    #[serde(default = "default_connector_ratio")]
    pub connector_ratio: f64,
    #[serde(default = "default_repeated_opening_min")]
    pub repeated_opening_min: usize,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            accept: default_accept(),
            revise: default_revise(),
            translate_confidence: default_translate_confidence(),
            telltale_external_confidence: default_telltale_external_confidence(),
            grammar_error_cap: default_grammar_error_cap(),
            structural_min_sentences: default_structural_min_sentences(),
            sentence_cv_min: default_sentence_cv_min(),
            paragraph_cv_min: default_paragraph_cv_min(),
            fragment_max_words: default_fragment_max_words(),
            capitalization_min_sentences: default_capitalization_min_sentences(),
            hedging_per_100: default_hedging_per_100(),
            transitions_per_100: default_transitions_per_100(),
            passive_ratio: default_passive_ratio(),
            contraction_min_words: default_contraction_min_words(),
            ttr_max: default_ttr_max(),
            ttr_min_words: default_ttr_min_words(),
            connector_ratio: default_connector_ratio(),
            repeated_opening_min: default_repeated_opening_min(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScoringConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub patterns: PatternConfig,
    #[serde(default)]
    pub weights: WeightConfig,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            patterns: PatternConfig::default(),
            weights: WeightConfig::default(),
            thresholds: ThresholdConfig::default(),
        }
    }
}

impl ScoringConfig {
    pub fn from_json(raw: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: ScoringConfig =
            serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
                path: origin.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: self.schema_version,
                expected: SCHEMA_VERSION,
            });
        }

        let w = &self.weights;
        let all = [w.external_detection, w.persona, w.structural, w.legacy];
        if all.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(ConfigError::InvalidWeights(
                "weights must be finite and non-negative".to_string(),
            ));
        }
        if all.iter().sum::<f64>() <= 0.0 {
            return Err(ConfigError::InvalidWeights(
                "weights must sum to a positive value".to_string(),
            ));
        }

        let t = &self.thresholds;
        if !(0.0 <= t.revise && t.revise < t.accept && t.accept <= 100.0) {
            return Err(ConfigError::InvalidThresholds(format!(
                "expected 0 <= revise < accept <= 100, got revise={} accept={}",
                t.revise, t.accept
            )));
        }
        if !(0.0..=1.0).contains(&t.translate_confidence)
            || !(0.0..=1.0).contains(&t.telltale_external_confidence)
        {
            return Err(ConfigError::InvalidThresholds(
                "confidence thresholds must lie in [0, 1]".to_string(),
            ));
        }

        let ratios = [
            ("passiveRatio", t.passive_ratio),
            ("ttrMax", t.ttr_max),
            ("connectorRatio", t.connector_ratio),
        ];
        if let Some((name, v)) = ratios.iter().find(|(_, v)| !(0.0..=1.0).contains(v)) {
            return Err(ConfigError::InvalidThresholds(format!(
                "{} must lie in [0, 1], got {}",
                name, v
            )));
        }
        let non_negative = [
            ("hedgingPer100", t.hedging_per_100),
            ("transitionsPer100", t.transitions_per_100),
            ("sentenceCvMin", t.sentence_cv_min),
            ("paragraphCvMin", t.paragraph_cv_min),
        ];
        if let Some((name, v)) = non_negative
            .iter()
            .find(|(_, v)| !v.is_finite() || *v < 0.0)
        {
            return Err(ConfigError::InvalidThresholds(format!(
                "{} must be finite and non-negative, got {}",
                name, v
            )));
        }
        if !(0.0..=100.0).contains(&t.grammar_error_cap) {
            return Err(ConfigError::InvalidThresholds(format!(
                "grammarErrorCap must lie in [0, 100], got {}",
                t.grammar_error_cap
            )));
        }

        for (country, families) in &self.patterns.linguistic_signatures {
            for family in families {
                for pattern in &family.patterns {
                    compile_pattern(pattern, &format!("{}/{}", country, family.name))?;
                }
            }
        }

        Ok(())
    }
}

/// Compile a case-insensitive signature regex.
pub fn compile_pattern(pattern: &str, context: &str) -> Result<Regex, ConfigError> {
    Regex::new(&format!("(?i){}", pattern)).map_err(|source| ConfigError::InvalidPattern {
        context: context.to_string(),
        pattern: pattern.to_string(),
        source,
    })
}

pub struct ConfigStore {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_file = config_dir.join(CONFIG_FILE_NAME);
        Self {
            config_dir,
            config_file,
        }
    }

    /// `AUTHENTICITY_CONFIG_DIR`, else the platform config dir.
    pub fn default_config_dir() -> Option<PathBuf> {
        match std::env::var("AUTHENTICITY_CONFIG_DIR") {
            Ok(p) if !p.trim().is_empty() => Some(PathBuf::from(p)),
            _ => dirs::config_dir().map(|p| p.join("authenticity-gate")),
        }
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Load and validate. A missing file yields the documented defaults;
    /// a present but malformed file is an error.
    pub fn load(&self) -> Result<ScoringConfig, ConfigError> {
        if !self.config_file.exists() {
            return Ok(ScoringConfig::default());
        }

        let content = fs::read_to_string(&self.config_file).map_err(|source| ConfigError::Io {
            path: self.config_file.clone(),
            source,
        })?;

        ScoringConfig::from_json(&content, &self.config_file)
    }

    pub fn save(&self, config: &ScoringConfig) -> Result<(), ConfigError> {
        config.validate()?;
        fs::create_dir_all(&self.config_dir).map_err(|source| ConfigError::Io {
            path: self.config_dir.clone(),
            source,
        })?;

        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.config_file, content).map_err(|source| ConfigError::Io {
            path: self.config_file.clone(),
            source,
        })
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_schema_version() -> u32 { SCHEMA_VERSION }
fn default_external_weight() -> f64 { 0.50 }
fn default_persona_weight() -> f64 { 0.25 }
fn default_structural_weight() -> f64 { 0.15 }
fn default_legacy_weight() -> f64 { 0.10 }
fn default_accept() -> f64 { 70.0 }
fn default_revise() -> f64 { 40.0 }
fn default_translate_confidence() -> f64 { 0.7 }
fn default_telltale_external_confidence() -> f64 { 0.8 }
fn default_grammar_error_cap() -> f64 { 35.0 }
fn default_structural_min_sentences() -> usize { 3 }
fn default_sentence_cv_min() -> f64 { 0.30 }
fn default_paragraph_cv_min() -> f64 { 0.20 }
fn default_fragment_max_words() -> usize { 3 }
fn default_capitalization_min_sentences() -> usize { 8 }
fn default_hedging_per_100() -> f64 { 2.0 }
fn default_transitions_per_100() -> f64 { 3.0 }
fn default_passive_ratio() -> f64 { 0.20 }
fn default_contraction_min_words() -> usize { 100 }
fn default_ttr_max() -> f64 { 0.80 }
fn default_ttr_min_words() -> usize { 50 }
fn default_connector_ratio() -> f64 { 0.5 }
fn default_repeated_opening_min() -> usize { 3 }

fn default_telltale_phrases() -> Vec<String> {
    to_strings(&[
        "delve into",
        "delves into",
        "delving into",
        "it is important to note",
        "it's important to note",
        "it is worth noting",
        "navigate the landscape of",
        "navigating the landscape of",
        "in today's fast-paced world",
        "crucial aspect",
        "crucial role in",
        "seamlessly integrates",
        "seamless integration",
        "a testament to",
        "tapestry of",
        "in the realm of",
        "unlock the potential",
        "unleash the power",
        "plays a pivotal role",
        "embark on a journey",
        "ever-evolving landscape",
        "in conclusion, ",
        "game-changer",
        "cutting-edge solution",
        "harness the power",
    ])
}

fn default_hedging_words() -> Vec<String> {
    to_strings(&[
        "perhaps", "possibly", "potentially", "arguably", "generally", "typically",
        "somewhat", "relatively", "fairly", "seemingly", "presumably", "likely",
        "might", "may", "could", "apparently", "conceivably",
    ])
}

fn default_formal_transitions() -> Vec<String> {
    to_strings(&[
        "furthermore", "moreover", "additionally", "consequently", "therefore",
        "thus", "hence", "nevertheless", "nonetheless", "subsequently",
        "accordingly", "ultimately", "however", "notably", "importantly",
    ])
}

fn default_connectors() -> Vec<String> {
    to_strings(&["then", "so"])
}

fn default_linguistic_signatures() -> BTreeMap<String, Vec<SignatureFamily>> {
    let mut map = BTreeMap::new();
    map.insert(
        "united_states".to_string(),
        vec![
            SignatureFamily::new(
                "phrasal_verbs",
                &[
                    r"\b(?:figure|sort|work|carry|set|break|clean|wipe|rule|point)s?\s+(?:out|up|off|down|through)\b",
                    r"\b(?:turned|turns|turn)\s+(?:out|up)\b",
                ],
            ),
            SignatureFamily::new(
                "quantified_outcomes",
                &[
                    r"\b\d+(?:\.\d+)?\s?(?:%|percent\b)",
                    r"\b(?:cut|reduced|boosted|improved|dropped)\b[^.]{0,40}\b\d+",
                ],
            ),
            SignatureFamily::new(
                "direct_conclusions",
                &[r"\bbottom line\b", r"\bthe upshot\b", r"\bin short\b"],
            ),
        ],
    );
    map.insert(
        "taiwan".to_string(),
        vec![
            SignatureFamily::new(
                "topic_comment",
                &[
                    r"\b(?:this|the)\s+\w+,\s+(?:it|we|they)\b",
                    r"\bas for\s+(?:the\s+)?\w+,",
                ],
            ),
            SignatureFamily::new(
                "measurement_first",
                &[
                    r"^\s*\d+(?:\.\d+)?\s?(?:nm|µm|um|mm|cm|w|kw|hz|khz|j|°c)\b",
                    r"(?:^|[.!?]\s+)(?:at|with)\s+\d+(?:\.\d+)?\s?(?:nm|µm|um|mm|w|kw|hz|khz|j)\b",
                ],
            ),
            SignatureFamily::new(
                "article_omission",
                &[r"\b(?:result|surface|process|method)\s+(?:is|shows)\s+(?:good|clear|clean|stable)\b"],
            ),
        ],
    );
    map.insert(
        "italy".to_string(),
        vec![
            SignatureFamily::new(
                "cleft_structures",
                &[
                    r"\bit is (?:the|this|precisely)\s+\w+\s+(?:that|which)\b",
                    r"\bwhat (?:matters|counts|strikes)\b",
                ],
            ),
            SignatureFamily::new(
                "romance_cognates",
                &[
                    r"\b(?:elegant|harmonious|delicate|meticulous|patrimony|restoration|artisanal)\b",
                ],
            ),
            SignatureFamily::new(
                "subordinate_chains",
                &[r"\b(?:which|whereby|wherein)\b[^.]{0,80}\b(?:which|that)\b"],
            ),
        ],
    );
    map.insert(
        "indonesia".to_string(),
        vec![
            SignatureFamily::new(
                "reduplication",
                &[r"\b(\w+)-(\w+)\b"],
            ),
            SignatureFamily::new(
                "paratactic_connectors",
                &[r"\b(?:and then|so that|and also)\b"],
            ),
            SignatureFamily::new(
                "demonstrative_clustering",
                &[r"\b(?:this|that)\s+\w+\s+(?:this|that)\b"],
            ),
        ],
    );
    map
}
