// Statistical Analysis
// Word-level rates: hedging, transitions, passive voice, contractions, vocabulary spread

use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

use super::context::ScoringContext;
use crate::models::{ComponentRules, DetectionResult, Dimension, Issue, Severity};
use crate::services::text_processor::{split_sentences, words};

const HEDGING_PENALTY: f64 = 25.0;
const TRANSITION_PENALTY: f64 = 25.0;
const PASSIVE_PENALTY: f64 = 20.0;
const CONTRACTION_PENALTY: f64 = 15.0;
const TTR_PENALTY: f64 = 15.0;
const SECOND_PERSON_PENALTY: f64 = 10.0;

const SECOND_PERSON: &[&str] = &["you", "your", "yours", "yourself", "yourselves"];

fn passive_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:am|is|are|was|were|be|been|being)\s+(?:\w+ly\s+)?(?:\w+ed|built|done|made|given|taken|seen|shown|known|written|found|held|kept|left|sent|brought|bought|caught|taught|chosen|driven|eaten|hidden|spoken|stolen|worn|thrown|drawn|grown)\b",
        )
        .expect("passive regex")
    })
}

fn per_hundred(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    count as f64 * 100.0 / total as f64
}

pub fn analyze_statistics(text: &str, rules: ComponentRules, ctx: &ScoringContext) -> DetectionResult {
    let t = ctx.thresholds();
    let tokens = words(text);
    let total = tokens.len();
    let mut issues = Vec::new();
    let mut metrics = BTreeMap::new();
    let mut penalty = 0.0;

    let hedges: Vec<&String> = tokens.iter().filter(|w| ctx.is_hedging_word(w)).collect();
    let hedging_rate = per_hundred(hedges.len(), total);
    metrics.insert("hedging_per_100".to_string(), hedging_rate);
    if hedging_rate > t.hedging_per_100 {
        penalty += HEDGING_PENALTY;
        issues.push(
            Issue::new(
                Dimension::Statistical,
                Severity::Moderate,
                format!("hedging density {:.1} per 100 words", hedging_rate),
            )
            .with_evidence(dedup(&hedges)),
        );
    }

    let transitions: Vec<&String> = tokens
        .iter()
        .filter(|w| ctx.is_formal_transition(w))
        .collect();
    let transition_rate = per_hundred(transitions.len(), total);
    metrics.insert("transitions_per_100".to_string(), transition_rate);
    if transition_rate > t.transitions_per_100 {
        penalty += TRANSITION_PENALTY;
        issues.push(
            Issue::new(
                Dimension::Statistical,
                Severity::Moderate,
                format!("formal transition density {:.1} per 100 words", transition_rate),
            )
            .with_evidence(dedup(&transitions)),
        );
    }

    let sentences = split_sentences(text);
    if !sentences.is_empty() {
        let passive: Vec<&str> = sentences
            .iter()
            .filter(|s| passive_re().is_match(&s.text))
            .map(|s| s.text.as_str())
            .collect();
        let ratio = passive.len() as f64 / sentences.len() as f64;
        metrics.insert("passive_ratio".to_string(), ratio);
        if ratio > t.passive_ratio {
            penalty += PASSIVE_PENALTY;
            issues.push(
                Issue::new(
                    Dimension::Statistical,
                    Severity::Minor,
                    format!("{:.0}% of sentences use passive voice", ratio * 100.0),
                )
                .with_evidence(passive.iter().take(3).map(|s| s.to_string()).collect()),
            );
        }
    }

    let contractions = tokens.iter().filter(|w| w.contains('\'')).count();
    metrics.insert("contractions".to_string(), contractions as f64);
    if total > t.contraction_min_words && contractions == 0 {
        penalty += CONTRACTION_PENALTY;
        issues.push(Issue::new(
            Dimension::Statistical,
            Severity::Minor,
            format!("no contractions in {} words", total),
        ));
    }

    if total > 0 {
        let unique: HashSet<&String> = tokens.iter().collect();
        let ttr = unique.len() as f64 / total as f64;
        metrics.insert("type_token_ratio".to_string(), ttr);
        if total > t.ttr_min_words && ttr > t.ttr_max {
            penalty += TTR_PENALTY;
            issues.push(Issue::new(
                Dimension::Statistical,
                Severity::Minor,
                format!("vocabulary spread too even (type-token ratio {:.2})", ttr),
            ));
        }
    }

    if !rules.permits_second_person {
        let second: Vec<&String> = tokens
            .iter()
            .filter(|w| SECOND_PERSON.contains(&w.as_str()))
            .collect();
        if !second.is_empty() {
            penalty += SECOND_PERSON_PENALTY;
            issues.push(
                Issue::new(
                    Dimension::Statistical,
                    Severity::Minor,
                    "second-person address in a component that does not allow it",
                )
                .with_evidence(dedup(&second)),
            );
        }
    }

    metrics.insert("word_count".to_string(), total as f64);

    let severity = match penalty {
        p if p <= 0.0 => Severity::None,
        p if p <= 25.0 => Severity::Minor,
        p if p <= 50.0 => Severity::Moderate,
        _ => Severity::Severe,
    };

    DetectionResult {
        dimension: Dimension::Statistical,
        severity,
        score: (100.0 - penalty).max(0.0),
        issues,
        metrics,
    }
}

fn dedup(items: &[&String]) -> Vec<String> {
    let mut seen = Vec::new();
    for item in items {
        if !seen.contains(*item) {
            seen.push((*item).clone());
        }
    }
    seen
}
