// Translation Artifact Detection
// Reduplication, connector overuse and repeated sentence openings

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use super::context::ScoringContext;
use crate::models::{DetectionResult, Dimension, Issue, Severity};
use crate::services::text_processor::{split_sentences, words};

const MAX_EXAMPLES: usize = 5;

fn hyphen_pair_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\p{L}+)-(\p{L}+)\b").expect("hyphen pair regex"))
}

fn severity_for(hits: usize) -> Severity {
    match hits {
        0 => Severity::None,
        1..=2 => Severity::Minor,
        3..=5 => Severity::Moderate,
        _ => Severity::Severe,
    }
}

fn score_for(severity: Severity) -> f64 {
    match severity {
        Severity::None => 100.0,
        Severity::Minor => 85.0,
        Severity::Moderate => 60.0,
        _ => 30.0,
    }
}

/// Word-for-word reduplication such as "fast-fast".
fn find_reduplications(text: &str) -> Vec<String> {
    hyphen_pair_re()
        .captures_iter(text)
        .filter(|c| c[1].to_lowercase() == c[2].to_lowercase())
        .map(|c| c[0].to_string())
        .collect()
}

pub fn detect_translation_artifacts(text: &str, ctx: &ScoringContext) -> DetectionResult {
    let thresholds = ctx.thresholds();
    let sentences = split_sentences(text);
    let mut issues = Vec::new();
    let mut metrics = BTreeMap::new();

    let reduplications = find_reduplications(text);
    if !reduplications.is_empty() {
        issues.push(
            Issue::new(
                Dimension::TranslationArtifacts,
                Severity::Minor,
                format!("{} reduplicated word pair(s)", reduplications.len()),
            )
            .with_evidence(reduplications.iter().take(MAX_EXAMPLES).cloned().collect()),
        );
    }

    let mut connector_hits = 0usize;
    if sentences.len() >= 2 {
        let sentence_words: Vec<Vec<String>> =
            sentences.iter().map(|s| words(&s.text)).collect();
        for connector in ctx.connectors() {
            let using: Vec<&str> = sentences
                .iter()
                .zip(&sentence_words)
                .filter(|(_, w)| w.iter().any(|t| t == connector))
                .map(|(s, _)| s.text.as_str())
                .collect();
            let ratio = using.len() as f64 / sentences.len() as f64;
            if ratio > thresholds.connector_ratio {
                connector_hits += 1;
                issues.push(
                    Issue::new(
                        Dimension::TranslationArtifacts,
                        Severity::Minor,
                        format!(
                            "connector \"{}\" appears in {:.0}% of sentences",
                            connector,
                            ratio * 100.0
                        ),
                    )
                    .with_evidence(
                        using.iter().take(MAX_EXAMPLES).map(|s| s.to_string()).collect(),
                    ),
                );
            }
        }
    }

    let mut openings: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    for sentence in &sentences {
        if let Some(first) = sentence.first_word() {
            openings.entry(first).or_default().push(sentence.text.as_str());
        }
    }
    let mut repeated_openings = 0usize;
    for (word, group) in &openings {
        if group.len() >= thresholds.repeated_opening_min {
            repeated_openings += 1;
            issues.push(
                Issue::new(
                    Dimension::TranslationArtifacts,
                    Severity::Minor,
                    format!("{} sentences open with \"{}\"", group.len(), word),
                )
                .with_evidence(group.iter().take(MAX_EXAMPLES).map(|s| s.to_string()).collect()),
            );
        }
    }

    let hits = reduplications.len() + connector_hits + repeated_openings;
    let severity = severity_for(hits);
    for issue in &mut issues {
        issue.severity = severity;
    }

    metrics.insert("reduplications".to_string(), reduplications.len() as f64);
    metrics.insert("connector_overuse".to_string(), connector_hits as f64);
    metrics.insert("repeated_openings".to_string(), repeated_openings as f64);
    metrics.insert("hits".to_string(), hits as f64);

    DetectionResult {
        dimension: Dimension::TranslationArtifacts,
        severity,
        score: score_for(severity),
        issues,
        metrics,
    }
}
