// Structural Analysis
// Sentence rhythm, fragments, capitalization and paragraph balance

use std::collections::BTreeMap;

use super::context::ScoringContext;
use crate::models::{ComponentRules, DetectionResult, Dimension, Issue, Severity};
use crate::services::text_processor::{coefficient_of_variation, split_paragraphs, split_sentences, word_count};

const NEUTRAL: f64 = 50.0;
const PASS: f64 = 100.0;
const FLAGGED: f64 = 0.0;

const SENTENCE_VARIATION_PENALTY: f64 = 30.0;
const FRAGMENT_PENALTY: f64 = 20.0;
const CAPITALIZATION_PENALTY: f64 = 10.0;
const PARAGRAPH_VARIATION_PENALTY: f64 = 15.0;

const SUB_METRICS: [&str; 4] = [
    "sentence_variation",
    "fragment_presence",
    "capitalization",
    "paragraph_variation",
];

fn neutral_result(sentence_count: usize) -> DetectionResult {
    let mut result = DetectionResult::clean(Dimension::Structural, NEUTRAL);
    for name in SUB_METRICS {
        result.metrics.insert(name.to_string(), NEUTRAL);
    }
    result.metrics.insert("sentence_count".to_string(), sentence_count as f64);
    result
}

fn starts_uppercase(sentence: &str) -> bool {
    sentence
        .chars()
        .find(|c| c.is_alphabetic())
        .map_or(false, |c| c.is_uppercase())
}

/// Score structural variety. Short texts and components without structural
/// analysis are neutral rather than penalized.
pub fn analyze_structure(text: &str, rules: ComponentRules, ctx: &ScoringContext) -> DetectionResult {
    let t = ctx.thresholds();
    let sentences = split_sentences(text);

    if !rules.structural_analysis || sentences.len() < t.structural_min_sentences {
        return neutral_result(sentences.len());
    }

    let mut issues = Vec::new();
    let mut metrics = BTreeMap::new();
    let mut penalty = 0.0;

    let lengths: Vec<f64> = sentences.iter().map(|s| s.word_count() as f64).collect();
    let sentence_variation = match coefficient_of_variation(&lengths) {
        Some(cv) => {
            metrics.insert("sentence_length_cv".to_string(), cv);
            if cv < t.sentence_cv_min {
                penalty += SENTENCE_VARIATION_PENALTY;
                issues.push(Issue::new(
                    Dimension::Structural,
                    Severity::Moderate,
                    format!(
                        "sentence lengths are uniform (cv {:.2} < {:.2})",
                        cv, t.sentence_cv_min
                    ),
                ));
                FLAGGED
            } else {
                PASS
            }
        }
        None => NEUTRAL,
    };

    let fragment_presence = if sentences.len() > 3 {
        let has_fragment = lengths
            .iter()
            .any(|&n| n > 0.0 && n <= t.fragment_max_words as f64);
        if has_fragment {
            PASS
        } else {
            penalty += FRAGMENT_PENALTY;
            issues.push(Issue::new(
                Dimension::Structural,
                Severity::Minor,
                format!("no sentence fragment of {} words or fewer", t.fragment_max_words),
            ));
            FLAGGED
        }
    } else {
        NEUTRAL
    };

    let capitalization = if sentences.len() >= t.capitalization_min_sentences {
        if sentences.iter().all(|s| starts_uppercase(&s.text)) {
            penalty += CAPITALIZATION_PENALTY;
            issues.push(Issue::new(
                Dimension::Structural,
                Severity::Minor,
                "capitalization is uniform across every sentence",
            ));
            FLAGGED
        } else {
            PASS
        }
    } else {
        NEUTRAL
    };

    let paragraphs = split_paragraphs(text);
    let paragraph_variation = if paragraphs.len() >= 3 {
        let sizes: Vec<f64> = paragraphs.iter().map(|p| word_count(p) as f64).collect();
        match coefficient_of_variation(&sizes) {
            Some(cv) if cv < t.paragraph_cv_min => {
                metrics.insert("paragraph_length_cv".to_string(), cv);
                penalty += PARAGRAPH_VARIATION_PENALTY;
                issues.push(Issue::new(
                    Dimension::Structural,
                    Severity::Minor,
                    format!("paragraph lengths are uniform (cv {:.2})", cv),
                ));
                FLAGGED
            }
            Some(cv) => {
                metrics.insert("paragraph_length_cv".to_string(), cv);
                PASS
            }
            None => NEUTRAL,
        }
    } else {
        NEUTRAL
    };

    for (name, value) in SUB_METRICS.iter().zip([
        sentence_variation,
        fragment_presence,
        capitalization,
        paragraph_variation,
    ]) {
        metrics.insert(name.to_string(), value);
    }
    metrics.insert("sentence_count".to_string(), sentences.len() as f64);
    metrics.insert("paragraph_count".to_string(), paragraphs.len() as f64);

    let severity = match penalty {
        p if p <= 0.0 => Severity::None,
        p if p <= 20.0 => Severity::Minor,
        p if p <= 45.0 => Severity::Moderate,
        _ => Severity::Severe,
    };

    DetectionResult {
        dimension: Dimension::Structural,
        severity,
        score: (PASS - penalty).max(0.0),
        issues,
        metrics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ComponentType;

    #[test]
    fn test_short_text_is_neutral() {
        let ctx = ScoringContext::default();
        let result = analyze_structure(
            "One sentence here. Another one.",
            ComponentType::General.rules(),
            &ctx,
        );
        assert_eq!(result.score, 50.0);
        for name in SUB_METRICS {
            assert_eq!(result.metrics[name], 50.0);
        }
        assert!(!result.has_issues());
    }

    #[test]
    fn test_subtitle_skips_structure() {
        let ctx = ScoringContext::default();
        let text = "Same length words here. Same length words here. Same length words here. Same length words here.";
        let result = analyze_structure(text, ComponentType::Subtitle.rules(), &ctx);
        assert_eq!(result.score, 50.0);
    }

    #[test]
    fn test_uniform_sentences_are_penalized() {
        let ctx = ScoringContext::default();
        let text = "The laser cleans the steel plate well. The beam removes the oxide layer fast. \
                    The operator checks the surface twice. The result looks clean and bright.";
        let result = analyze_structure(text, ComponentType::General.rules(), &ctx);
        // Uniform lengths (-30) and no fragment (-20).
        assert_eq!(result.score, 50.0);
        assert_eq!(result.metrics["sentence_variation"], 0.0);
        assert_eq!(result.metrics["fragment_presence"], 0.0);
        assert_eq!(result.metrics["capitalization"], 50.0);
        assert_eq!(result.severity, Severity::Severe);
    }

    #[test]
    fn test_varied_text_passes() {
        let ctx = ScoringContext::default();
        let text = "Rust gone. We ran the laser across the flange for about twenty minutes \
                    while the crew watched the plume. Then it was quiet. The paint underneath \
                    was untouched, which surprised everyone.";
        let result = analyze_structure(text, ComponentType::General.rules(), &ctx);
        assert_eq!(result.score, 100.0);
        assert_eq!(result.severity, Severity::None);
    }
}
