// Linguistic Pattern Analysis
// Country-specific voice signatures, scored per family

use regex::Regex;
use std::collections::BTreeMap;

use super::context::{CompiledFamily, ScoringContext};
use crate::models::{DetectionResult, Dimension, Issue, PatternQuality, Severity};

const BASELINE: f64 = 50.0;
const FAMILY_BONUS: f64 = 10.0;
const STRONG_FAMILY_MATCHES: usize = 3;

/// Count matches of one signature pattern. A pattern with exactly two capture
/// groups only counts when both captures are equal, ignoring case.
fn count_matches(pattern: &Regex, text: &str) -> usize {
    if pattern.captures_len() == 3 {
        pattern
            .captures_iter(text)
            .filter(|c| match (c.get(1), c.get(2)) {
                (Some(a), Some(b)) => a.as_str().to_lowercase() == b.as_str().to_lowercase(),
                _ => false,
            })
            .count()
    } else {
        pattern.find_iter(text).count()
    }
}

fn family_matches(family: &CompiledFamily, text: &str) -> usize {
    family.patterns.iter().map(|p| count_matches(p, text)).sum()
}

pub fn quality_from_counts(counts: &[usize]) -> PatternQuality {
    let matched = counts.iter().filter(|&&c| c > 0).count();
    if counts.iter().any(|&c| c >= STRONG_FAMILY_MATCHES) || matched >= 2 {
        PatternQuality::Authentic
    } else if matched == 1 {
        PatternQuality::Partial
    } else {
        PatternQuality::Absent
    }
}

/// Score how strongly the text carries the signatures of `country`.
pub fn analyze_linguistic_patterns(
    text: &str,
    country: &str,
    ctx: &ScoringContext,
) -> (DetectionResult, PatternQuality) {
    let Some(families) = ctx.signatures_for(country) else {
        let mut result = DetectionResult::clean(Dimension::Linguistic, BASELINE);
        result.severity = Severity::Minor;
        result.issues.push(Issue::new(
            Dimension::Linguistic,
            Severity::Minor,
            format!("no linguistic signatures configured for country \"{}\"", country),
        ));
        return (result, PatternQuality::Absent);
    };

    let mut metrics = BTreeMap::new();
    let counts: Vec<usize> = families
        .iter()
        .map(|family| {
            let n = family_matches(family, text);
            metrics.insert(format!("family.{}", family.name), n as f64);
            n
        })
        .collect();

    let matched = counts.iter().filter(|&&c| c > 0).count();
    let quality = quality_from_counts(&counts);
    let score = (BASELINE + FAMILY_BONUS * matched as f64).min(100.0);
    metrics.insert("families_matched".to_string(), matched as f64);

    let mut issues = Vec::new();
    let severity = if matched == 0 {
        let names: Vec<String> = families.iter().map(|f| f.name.clone()).collect();
        issues.push(
            Issue::new(
                Dimension::Linguistic,
                Severity::Moderate,
                format!("no {} voice signatures found", country),
            )
            .with_evidence(names),
        );
        Severity::Moderate
    } else {
        Severity::None
    };

    (
        DetectionResult {
            dimension: Dimension::Linguistic,
            severity,
            score,
            issues,
            metrics,
        },
        quality,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paired_capture_requires_equal_halves() {
        let re = Regex::new(r"(?i)\b(\w+)-(\w+)\b").unwrap();
        assert_eq!(count_matches(&re, "cepat-cepat and well-known and Pelan-pelan"), 2);
    }

    #[test]
    fn test_quality_thresholds() {
        assert_eq!(quality_from_counts(&[0, 0, 0]), PatternQuality::Absent);
        assert_eq!(quality_from_counts(&[1, 0, 0]), PatternQuality::Partial);
        assert_eq!(quality_from_counts(&[1, 1, 0]), PatternQuality::Authentic);
        assert_eq!(quality_from_counts(&[3, 0, 0]), PatternQuality::Authentic);
    }

    #[test]
    fn test_united_states_signatures() {
        let ctx = ScoringContext::default();
        let text = "Turns out the rust came off fast. Bottom line: cleanup time dropped 40%.";
        let (result, quality) = analyze_linguistic_patterns(text, "united_states", &ctx);
        assert_eq!(quality, PatternQuality::Authentic);
        assert!(result.score >= 70.0);
        assert!(result.score <= 100.0);
        assert!(!result.has_issues());
    }

    #[test]
    fn test_indonesian_reduplication_family() {
        let ctx = ScoringContext::default();
        let (result, _) =
            analyze_linguistic_patterns("We worked slowly, pelan-pelan, on each panel.", "indonesia", &ctx);
        assert_eq!(result.metrics["family.reduplication"], 1.0);
    }

    #[test]
    fn test_unknown_country_is_absent_with_note() {
        let ctx = ScoringContext::default();
        let (result, quality) = analyze_linguistic_patterns("Anything at all.", "atlantis", &ctx);
        assert_eq!(quality, PatternQuality::Absent);
        assert_eq!(result.score, 50.0);
        assert!(result.issues[0].message.contains("atlantis"));
    }

    #[test]
    fn test_no_signatures_is_flagged() {
        let ctx = ScoringContext::default();
        let (result, quality) = analyze_linguistic_patterns("Plain words.", "italy", &ctx);
        assert_eq!(quality, PatternQuality::Absent);
        assert_eq!(result.score, 50.0);
        assert_eq!(result.severity, Severity::Moderate);
    }
}
