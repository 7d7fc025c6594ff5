// Aggregation Logic
// Combines detector results into one weighted score and a recommendation

use std::collections::BTreeMap;

use super::context::ScoringContext;
use crate::models::{
    ComponentType, DetectionResult, InstantFail, Issue, LanguageReport, PatternQuality,
    QualityReport, Recommendation,
};
use crate::services::config_store::ThresholdConfig;
use crate::services::text_processor::mean;

/// Persona-dependent results. Absent when scoring without an author.
#[derive(Debug, Clone)]
pub struct PersonaResults {
    pub forbidden: DetectionResult,
    pub linguistic: DetectionResult,
    pub pattern_quality: PatternQuality,
    pub compliance: DetectionResult,
    pub marker_count: usize,
}

/// Every detector output for one text.
#[derive(Debug, Clone)]
pub struct DetectionBundle {
    pub language: LanguageReport,
    pub telltale: DetectionResult,
    pub grammar: DetectionResult,
    pub artifacts: DetectionResult,
    pub structural: DetectionResult,
    pub statistical: DetectionResult,
    pub persona: Option<PersonaResults>,
    pub component_type: ComponentType,
}

/// Map a score onto a recommendation. Translate only applies below revise.
pub fn classify(score: f64, language: &LanguageReport, t: &ThresholdConfig) -> Recommendation {
    if score >= t.accept {
        Recommendation::Accept
    } else if score >= t.revise {
        Recommendation::Revise
    } else if needs_translation(language, t) {
        Recommendation::Translate
    } else {
        Recommendation::Regenerate
    }
}

pub fn needs_translation(language: &LanguageReport, t: &ThresholdConfig) -> bool {
    !language.language.is_english() && language.confidence > t.translate_confidence
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Weighted blend over the components that are available, renormalized so
/// missing components do not drag the score toward zero.
fn weighted_score(components: &[(f64, f64)]) -> f64 {
    let total_weight: f64 = components.iter().map(|(w, _)| *w).sum();
    if total_weight <= 0.0 {
        let scores: Vec<f64> = components.iter().map(|(_, s)| *s).collect();
        return mean(&scores);
    }
    components.iter().map(|(w, s)| w * s).sum::<f64>() / total_weight
}

/// Build the final report. Pure; identical inputs give identical output.
pub fn aggregate(
    bundle: DetectionBundle,
    external_human_score: Option<f64>,
    ctx: &ScoringContext,
) -> QualityReport {
    let t = ctx.thresholds();
    let w = ctx.weights();
    let external = external_human_score
        .filter(|s| s.is_finite())
        .map(|s| s.clamp(0.0, 100.0));

    let mut dimension_scores = BTreeMap::new();
    let mut issues: Vec<Issue> = Vec::new();
    let mut collect = |result: &DetectionResult, issues: &mut Vec<Issue>| {
        dimension_scores.insert(result.dimension.as_str().to_string(), result.score);
        issues.extend(result.issues.iter().cloned());
    };

    collect(&bundle.telltale, &mut issues);
    collect(&bundle.grammar, &mut issues);
    collect(&bundle.artifacts, &mut issues);
    collect(&bundle.structural, &mut issues);
    collect(&bundle.statistical, &mut issues);
    if let Some(persona) = &bundle.persona {
        collect(&persona.forbidden, &mut issues);
        collect(&persona.linguistic, &mut issues);
        collect(&persona.compliance, &mut issues);
    }

    let legacy = mean(&[
        bundle.statistical.score,
        bundle.telltale.score,
        bundle.artifacts.score,
    ]);
    let persona_score = bundle
        .persona
        .as_ref()
        .map(|p| mean(&[p.linguistic.score, p.compliance.score]));

    let mut components = Vec::with_capacity(4);
    if let Some(h) = external {
        components.push((w.external_detection, h));
        dimension_scores.insert("external_detection".to_string(), h);
    }
    if let Some(p) = persona_score {
        components.push((w.persona, p));
        dimension_scores.insert("persona".to_string(), round2(p));
    }
    components.push((w.structural, bundle.structural.score));
    components.push((w.legacy, legacy));
    dimension_scores.insert("legacy".to_string(), round2(legacy));

    let forbidden_hit = bundle
        .persona
        .as_ref()
        .map_or(false, |p| p.forbidden.has_issues());
    let telltale_hit = bundle.telltale.has_issues();

    let (score, recommendation, instant_fail) = if forbidden_hit {
        (0.0, Recommendation::Regenerate, Some(InstantFail::ForbiddenPhrase))
    } else if telltale_hit {
        if let Some(h) = external {
            let ai_confidence = 1.0 - h / 100.0;
            if ai_confidence > t.telltale_external_confidence {
                for issue in issues
                    .iter_mut()
                    .filter(|i| i.dimension == bundle.telltale.dimension)
                {
                    issue
                        .evidence
                        .push(format!("external detector ai confidence {:.2}", ai_confidence));
                }
            }
        }
        (0.0, Recommendation::Regenerate, Some(InstantFail::TelltalePhrase))
    } else {
        let mut score = weighted_score(&components).clamp(0.0, 100.0);
        if bundle.grammar.has_issues() {
            score = score.min(t.grammar_error_cap);
        }
        if needs_translation(&bundle.language, t) {
            score = score.min((t.revise - 1.0).max(0.0));
            (round2(score), Recommendation::Translate, None)
        } else {
            let score = round2(score);
            (score, classify(score, &bundle.language, t), None)
        }
    };

    // Stable: equal severities keep detector order.
    issues.sort_by(|a, b| b.severity.cmp(&a.severity));

    let (pattern_quality, marker_count) = match &bundle.persona {
        Some(p) => (p.pattern_quality, p.marker_count),
        None => (PatternQuality::NotApplicable, 0),
    };

    QualityReport {
        overall_score: score,
        accepted: recommendation == Recommendation::Accept,
        recommendation,
        language: bundle.language,
        dimension_scores,
        issues,
        pattern_quality,
        marker_count,
        instant_fail,
        external_human_score: external,
        component_type: bundle.component_type,
    }
}
