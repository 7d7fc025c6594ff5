// Telltale Phrase Detection
// Any configured phrase is an instant fail

use std::collections::BTreeMap;

use super::context::ScoringContext;
use crate::models::{DetectionResult, Dimension, Issue, Severity};
use crate::services::text_processor::context_snippet;

const SNIPPET_RADIUS: usize = 30;

pub fn detect_telltale_phrases(text: &str, ctx: &ScoringContext) -> DetectionResult {
    let lower = text.to_lowercase();
    let mut issues = Vec::new();

    for phrase in ctx.telltale_phrases() {
        let Some(start) = lower.find(phrase.as_str()) else {
            continue;
        };
        let occurrences = lower.matches(phrase.as_str()).count();
        let snippet = context_snippet(&lower, start, start + phrase.len(), SNIPPET_RADIUS);
        issues.push(
            Issue::new(
                Dimension::Telltale,
                Severity::Critical,
                format!("telltale phrase \"{}\" ({}x)", phrase, occurrences),
            )
            .with_evidence(vec![snippet]),
        );
    }

    if issues.is_empty() {
        return DetectionResult::clean(Dimension::Telltale, 100.0);
    }

    let mut metrics = BTreeMap::new();
    metrics.insert("phrases".to_string(), issues.len() as f64);
    DetectionResult {
        dimension: Dimension::Telltale,
        severity: Severity::Critical,
        score: 0.0,
        issues,
        metrics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telltale_is_critical() {
        let ctx = ScoringContext::default();
        let result = detect_telltale_phrases(
            "Let us Delve Into the cleaning cycle and see what happens.",
            &ctx,
        );
        assert_eq!(result.severity, Severity::Critical);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.issues.len(), 1);
        assert!(result.issues[0].evidence[0].contains("delve into"));
    }

    #[test]
    fn test_plain_text_passes() {
        let ctx = ScoringContext::default();
        let result = detect_telltale_phrases("We cleaned the weld seam in two passes.", &ctx);
        assert_eq!(result.score, 100.0);
        assert_eq!(result.severity, Severity::None);
    }
}
