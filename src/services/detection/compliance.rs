// Persona Compliance
// Forbidden phrases (instant fail), pattern-family coverage and signature marker tally

use std::collections::BTreeMap;

use crate::models::{DetectionResult, Dimension, Issue, Severity};
use crate::services::personas::{AuthorProfile, EXEMPT_FORBIDDEN_CATEGORY};
use crate::services::text_processor::count_phrase;

pub const MIN_PATTERN_FAMILIES: usize = 2;
const MISSING_FAMILY_PENALTY: f64 = 15.0;

/// Occurrences of each signature phrase in a text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerTally {
    pub total: usize,
    pub per_marker: BTreeMap<String, usize>,
}

impl MarkerTally {
    /// Markers used more than once, with their counts.
    pub fn repeated(&self) -> Vec<(&str, usize)> {
        self.per_marker
            .iter()
            .filter(|(_, &n)| n > 1)
            .map(|(m, &n)| (m.as_str(), n))
            .collect()
    }
}

pub fn count_markers(text: &str, profile: &AuthorProfile) -> MarkerTally {
    let lower = text.to_lowercase();
    let mut tally = MarkerTally::default();
    for phrase in &profile.signature_phrases {
        let n = count_phrase(&lower, phrase);
        if n > 0 {
            tally.total += n;
            *tally.per_marker.entry(phrase.to_lowercase()).or_insert(0) += n;
        }
    }
    tally
}

/// Any non-exempt forbidden phrase is critical.
pub fn check_forbidden_phrases(text: &str, profile: &AuthorProfile) -> DetectionResult {
    let lower = text.to_lowercase();
    let mut issues = Vec::new();

    for (category, phrases) in &profile.forbidden_phrases {
        if category == EXEMPT_FORBIDDEN_CATEGORY {
            continue;
        }
        let found: Vec<String> = phrases
            .iter()
            .filter(|p| count_phrase(&lower, p) > 0)
            .cloned()
            .collect();
        if !found.is_empty() {
            issues.push(
                Issue::new(
                    Dimension::ForbiddenPhrases,
                    Severity::Critical,
                    format!("forbidden {} phrase(s) for {}", category, profile.id),
                )
                .with_evidence(found),
            );
        }
    }

    if issues.is_empty() {
        return DetectionResult::clean(Dimension::ForbiddenPhrases, 100.0);
    }
    DetectionResult {
        dimension: Dimension::ForbiddenPhrases,
        severity: Severity::Critical,
        score: 0.0,
        issues,
        metrics: BTreeMap::new(),
    }
}

pub fn check_pattern_compliance(text: &str, profile: &AuthorProfile) -> DetectionResult {
    let lower = text.to_lowercase();
    let mut metrics = BTreeMap::new();

    let mut absent = Vec::new();
    let mut present = 0usize;
    for family in &profile.pattern_families {
        let hits: usize = family.markers.iter().map(|m| count_phrase(&lower, m)).sum();
        metrics.insert(format!("family.{}", family.name), hits as f64);
        if hits > 0 {
            present += 1;
        } else {
            absent.push(family.name.clone());
        }
    }

    let required = MIN_PATTERN_FAMILIES.min(profile.pattern_families.len());
    let missing = required.saturating_sub(present);
    metrics.insert("families_present".to_string(), present as f64);

    if missing == 0 {
        let mut result = DetectionResult::clean(Dimension::PatternCompliance, 100.0);
        result.metrics = metrics;
        return result;
    }

    DetectionResult {
        dimension: Dimension::PatternCompliance,
        severity: Severity::Moderate,
        score: (100.0 - MISSING_FAMILY_PENALTY * missing as f64).max(0.0),
        issues: vec![Issue::new(
            Dimension::PatternCompliance,
            Severity::Moderate,
            format!(
                "only {} of {} required pattern families present",
                present, required
            ),
        )
        .with_evidence(absent)],
        metrics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::personas::fixtures::{taiwan_profile, united_states_profile};

    #[test]
    fn test_forbidden_phrase_is_critical() {
        let profile = taiwan_profile();
        let result = check_forbidden_phrases("The finish was Breathtaking.", &profile);
        assert_eq!(result.severity, Severity::Critical);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.issues[0].evidence, vec!["breathtaking".to_string()]);
    }

    #[test]
    fn test_direct_address_category_is_exempt() {
        let profile = taiwan_profile();
        let result = check_forbidden_phrases("You will see the oxide lift.", &profile);
        assert!(!result.has_issues());
        assert_eq!(result.score, 100.0);
    }

    #[test]
    fn test_pattern_compliance_counts_families() {
        let profile = taiwan_profile();
        let full = check_pattern_compliance("In practice we can see the layer go.", &profile);
        assert_eq!(full.score, 100.0);

        let partial = check_pattern_compliance("In practice it works.", &profile);
        assert_eq!(partial.score, 85.0);
        assert_eq!(partial.issues[0].evidence, vec!["observation", "measurement"]);

        let none = check_pattern_compliance("Nothing relevant.", &profile);
        assert_eq!(none.score, 70.0);
    }

    #[test]
    fn test_marker_tally_and_repeats() {
        let profile = united_states_profile();
        let tally = count_markers(
            "Turns out it works. Bottom line, it turns out fine. In short: done.",
            &profile,
        );
        assert_eq!(tally.total, 4);
        assert_eq!(tally.repeated(), vec![("turns out", 2)]);
    }
}
