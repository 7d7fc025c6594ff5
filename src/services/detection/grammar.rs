// Grammar Check
// Subject-verb agreement heuristics; any hit caps the aggregate score

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::models::{DetectionResult, Dimension, Issue, Severity};
use crate::services::text_processor::context_snippet;

const PENALTY_PER_ERROR: f64 = 40.0;

const BASE_VERBS: &str = "achieve|provide|ensure|require|remove|improve|create|allow|make|produce|remain|show|help|reduce|increase|enable|offer|deliver|include|need|use|cause|leave|work|take|give|seem|appear|become|clean|prevent|damage";

/// Words after which the next noun phrase opens a new clause and is therefore a subject.
const CLAUSE_OPENERS: &[&str] = &[
    "and", "but", "or", "so", "yet", "because", "since", "although", "though", "while",
    "when", "whenever", "where", "if", "unless", "once", "until", "then", "that", "whether",
    "after", "before", "now", "also", "still", "often", "always", "usually", "sometimes",
];

/// Tokens the singular-subject pattern would otherwise mistake for nouns.
const NON_NOUNS: &[&str] = &[
    "we", "they", "you", "i", "people", "men", "women", "children", "can", "will", "would",
    "should", "could", "may", "might", "must", "does", "did", "to", "not", "also", "only",
    "really", "just", "often", "always", "never", "still",
];

fn singular_subject_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"(?i)\b(this|that|each|every)\s+([a-z]+)\s+({})\b", BASE_VERBS))
            .expect("singular subject regex")
    })
}

fn pronoun_subject_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"(?i)\b(it|he|she)\s+({})\b", BASE_VERBS))
            .expect("pronoun subject regex")
    })
}

fn plural_subject_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let inflected: Vec<String> = BASE_VERBS.split('|').map(third_person).collect();
        Regex::new(&format!(
            r"(?i)\b(these|those)\s+([a-z]+s)\s+({})\b",
            inflected.join("|")
        ))
        .expect("plural subject regex")
    })
}

fn third_person(verb: &str) -> String {
    if verb.ends_with('h') || verb.ends_with('s') {
        format!("{}es", verb)
    } else {
        format!("{}s", verb)
    }
}

fn is_singular_noun(word: &str) -> bool {
    let lower = word.to_ascii_lowercase();
    !NON_NOUNS.contains(&lower.as_str()) && (!lower.ends_with('s') || lower.ends_with("ss"))
}

/// A match counts only in subject position: at the start of the text or a sentence or clause,
/// or right after a clause opener. Objects ("keeps it clean", "let it work") and inverted
/// questions ("does it work") fall outside it.
fn in_subject_position(text: &str, start: usize) -> bool {
    let Some(prev) = text[..start].split_whitespace().next_back() else {
        return true;
    };
    if prev.ends_with(['.', '!', '?', ';', ':', ',', '(', '"', '\u{201C}']) {
        return true;
    }
    let word = prev
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_ascii_lowercase();
    word.is_empty() || CLAUSE_OPENERS.contains(&word.as_str())
}

/// Find subject-verb disagreements. Every hit is severe.
pub fn check_grammar(text: &str) -> DetectionResult {
    let mut hits: Vec<(usize, usize)> = Vec::new();

    for caps in singular_subject_re().captures_iter(text) {
        let whole = caps.get(0).map(|m| (m.start(), m.end()));
        if let Some((start, end)) = whole {
            if is_singular_noun(&caps[2]) && in_subject_position(text, start) {
                hits.push((start, end));
            }
        }
    }
    for m in pronoun_subject_re()
        .find_iter(text)
        .chain(plural_subject_re().find_iter(text))
    {
        if in_subject_position(text, m.start()) {
            hits.push((m.start(), m.end()));
        }
    }

    if hits.is_empty() {
        return DetectionResult::clean(Dimension::Grammar, 100.0);
    }

    hits.sort_unstable();
    hits.dedup();

    let issues = hits
        .iter()
        .map(|&(start, end)| {
            Issue::new(
                Dimension::Grammar,
                Severity::Severe,
                format!("subject-verb disagreement: \"{}\"", &text[start..end]),
            )
            .with_evidence(vec![context_snippet(text, start, end, 20)])
        })
        .collect::<Vec<_>>();

    let mut metrics = BTreeMap::new();
    metrics.insert("errors".to_string(), issues.len() as f64);

    DetectionResult {
        dimension: Dimension::Grammar,
        severity: Severity::Severe,
        score: (100.0 - PENALTY_PER_ERROR * issues.len() as f64).max(0.0),
        issues,
        metrics,
    }
}
