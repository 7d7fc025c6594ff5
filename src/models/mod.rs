// Authenticity Gate Data Models
// Shared value types flowing from detectors to the aggregate report

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============ Input ============

/// Kind of content being scored. Selects which rules apply.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    #[default]
    General,
    Description,
    Caption,
    Subtitle,
    Faq,
    Instructional,
}

/// Rule switches derived from a [`ComponentType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentRules {
    pub permits_second_person: bool,
    pub structural_analysis: bool,
}

impl ComponentType {
    pub fn rules(self) -> ComponentRules {
        match self {
            ComponentType::General | ComponentType::Faq | ComponentType::Instructional => {
                ComponentRules {
                    permits_second_person: true,
                    structural_analysis: true,
                }
            }
            ComponentType::Description | ComponentType::Caption => ComponentRules {
                permits_second_person: false,
                structural_analysis: true,
            },
            ComponentType::Subtitle => ComponentRules {
                permits_second_person: false,
                structural_analysis: false,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ComponentType::General => "general",
            ComponentType::Description => "description",
            ComponentType::Caption => "caption",
            ComponentType::Subtitle => "subtitle",
            ComponentType::Faq => "faq",
            ComponentType::Instructional => "instructional",
        }
    }
}

/// Immutable text passed by value through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSample {
    pub content: String,
    #[serde(default)]
    pub component_type: ComponentType,
}

impl TextSample {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            component_type: ComponentType::General,
        }
    }

    pub fn with_component(content: impl Into<String>, component_type: ComponentType) -> Self {
        Self {
            content: content.into(),
            component_type,
        }
    }
}

// ============ Language ============

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    English,
    Indonesian,
    Italian,
    Spanish,
    French,
    German,
    Portuguese,
    Chinese,
    UnknownNonEnglish,
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Language::English => "english",
            Language::Indonesian => "indonesian",
            Language::Italian => "italian",
            Language::Spanish => "spanish",
            Language::French => "french",
            Language::German => "german",
            Language::Portuguese => "portuguese",
            Language::Chinese => "chinese",
            Language::UnknownNonEnglish => "unknown_non_english",
        }
    }

    pub fn is_english(self) -> bool {
        self == Language::English
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageReport {
    pub language: Language,
    pub confidence: f64,
    /// Function words (or characters) that drove the classification.
    pub indicators: Vec<String>,
}

// ============ Detection Results ============

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    None,
    Minor,
    Moderate,
    Severe,
    Critical,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Telltale,
    ForbiddenPhrases,
    Grammar,
    TranslationArtifacts,
    Structural,
    Statistical,
    Linguistic,
    PatternCompliance,
}

impl Dimension {
    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Telltale => "telltale",
            Dimension::ForbiddenPhrases => "forbidden_phrases",
            Dimension::Grammar => "grammar",
            Dimension::TranslationArtifacts => "translation_artifacts",
            Dimension::Structural => "structural",
            Dimension::Statistical => "statistical",
            Dimension::Linguistic => "linguistic",
            Dimension::PatternCompliance => "pattern_compliance",
        }
    }
}

/// A single finding with the snippets that triggered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub dimension: Dimension,
    pub severity: Severity,
    pub message: String,
    #[serde(default)]
    pub evidence: Vec<String>,
}

impl Issue {
    pub fn new(dimension: Dimension, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            dimension,
            severity,
            message: message.into(),
            evidence: Vec::new(),
        }
    }

    pub fn with_evidence(mut self, evidence: Vec<String>) -> Self {
        self.evidence = evidence;
        self
    }
}

/// Output of one detector. Built once per call and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub dimension: Dimension,
    pub severity: Severity,
    /// Dimension score on a 0-100 scale (higher reads more human / more on-voice).
    pub score: f64,
    pub issues: Vec<Issue>,
    /// Named sub-metrics for diagnostics.
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

impl DetectionResult {
    pub fn clean(dimension: Dimension, score: f64) -> Self {
        Self {
            dimension,
            severity: Severity::None,
            score,
            issues: Vec::new(),
            metrics: BTreeMap::new(),
        }
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }
}

// ============ Persona Quality ============

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PatternQuality {
    Authentic,
    Partial,
    Absent,
    NotApplicable,
}

// ============ Aggregate ============

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Accept,
    Revise,
    Regenerate,
    Translate,
}

impl Recommendation {
    /// Ordering used for anti-regression checks: higher is better.
    pub fn rank(self) -> u8 {
        match self {
            Recommendation::Accept => 3,
            Recommendation::Revise => 2,
            Recommendation::Regenerate => 1,
            Recommendation::Translate => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Recommendation::Accept => "accept",
            Recommendation::Revise => "revise",
            Recommendation::Regenerate => "regenerate",
            Recommendation::Translate => "translate",
        }
    }
}

/// Terminal condition that short-circuited the weighted sum.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InstantFail {
    ForbiddenPhrase,
    TelltalePhrase,
}

/// Full scoring output. A pure function of the detection results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityReport {
    pub overall_score: f64,
    pub accepted: bool,
    pub recommendation: Recommendation,
    pub language: LanguageReport,
    pub dimension_scores: BTreeMap<String, f64>,
    /// Ordered most severe first.
    pub issues: Vec<Issue>,
    pub pattern_quality: PatternQuality,
    /// Occurrences of the persona's signature phrases.
    pub marker_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instant_fail: Option<InstantFail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_human_score: Option<f64>,
    pub component_type: ComponentType,
}

// ============ Enhancement ============

/// Route chosen by the enhancement controller after the initial validation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnhancementPath {
    Skip,
    Translate,
    Reprocess,
    Enhance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancementAttempt {
    pub index: usize,
    pub candidate: String,
    pub report: QualityReport,
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancementOutcome {
    pub text: String,
    pub report: QualityReport,
    pub path: EnhancementPath,
    pub improved: bool,
    pub attempts: Vec<EnhancementAttempt>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_rules() {
        assert!(ComponentType::Instructional.rules().permits_second_person);
        assert!(!ComponentType::Caption.rules().permits_second_person);
        assert!(!ComponentType::Subtitle.rules().structural_analysis);
        assert_eq!(ComponentType::default(), ComponentType::General);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::Severe);
        assert!(Severity::Minor > Severity::None);
    }

    #[test]
    fn test_recommendation_serialization() {
        let json = serde_json::to_string(&Recommendation::Translate).unwrap();
        assert_eq!(json, "\"translate\"");
        assert!(Recommendation::Accept.rank() > Recommendation::Revise.rank());
        assert!(Recommendation::Revise.rank() > Recommendation::Regenerate.rank());
    }

    #[test]
    fn test_language_names() {
        let json = serde_json::to_string(&Language::UnknownNonEnglish).unwrap();
        assert_eq!(json, "\"unknown_non_english\"");
        assert_eq!(Language::Indonesian.as_str(), "indonesian");
    }
}
