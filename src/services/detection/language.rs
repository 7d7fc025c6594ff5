// Language Detection
// Function-word intersection per language with a non-ASCII density fallback

use std::collections::BTreeSet;

use crate::models::{Language, LanguageReport};
use crate::services::text_processor::whitespace_tokens;

const MIN_INDICATOR_MATCHES: usize = 3;
const NON_ASCII_RATIO_LIMIT: f64 = 0.15;
const NON_ASCII_CONFIDENCE: f64 = 0.75;

const ENGLISH: &[&str] = &[
    "the", "and", "is", "are", "was", "were", "of", "to", "in", "that", "this", "with", "for",
    "it", "be", "on", "as", "by", "an", "which", "from", "at", "have", "has", "not", "or",
    "but", "they", "we", "its",
];
const INDONESIAN: &[&str] = &[
    "yang", "dan", "di", "ini", "itu", "dengan", "untuk", "dari", "pada", "adalah", "tidak",
    "akan", "dalam", "juga", "sangat", "atau", "karena", "sebagai", "oleh", "ke", "bisa",
];
const ITALIAN: &[&str] = &[
    "il", "lo", "gli", "della", "di", "che", "è", "per", "non", "sono", "nel", "anche",
    "questo", "molto", "con", "una", "delle", "alla",
];
const SPANISH: &[&str] = &[
    "el", "los", "las", "que", "de", "y", "en", "es", "por", "para", "con", "una", "del",
    "muy", "este", "esta", "pero", "como",
];
const FRENCH: &[&str] = &[
    "le", "les", "des", "est", "et", "une", "pour", "dans", "que", "qui", "avec", "pas",
    "sur", "ce", "cette", "sont", "du", "très",
];
const GERMAN: &[&str] = &[
    "der", "die", "das", "und", "ist", "nicht", "ein", "eine", "mit", "für", "auf", "dem",
    "von", "zu", "auch", "sich", "sehr", "wird",
];
const PORTUGUESE: &[&str] = &[
    "os", "que", "de", "em", "um", "uma", "para", "com", "não", "é", "da", "muito", "são",
    "por", "também", "está",
];
const CHINESE: &[char] = &['的', '是', '了', '在', '和', '有', '这', '我', '不', '也', '就', '都'];

/// Non-ASCII characters common in technical English that must not count as foreign script.
const SCIENTIFIC_SYMBOLS: &[char] = &[
    'µ', 'μ', '°', '±', '×', '÷', '²', '³', '¹', '⁰', '⁴', '⁵', '⁶', '⁷', '⁸', '⁹', '⁻', 'Ω',
    'α', 'β', 'γ', 'δ', 'Δ', 'λ', 'π', 'σ', '≤', '≥', '≈', '–', '…', '€', '£', '•',
];

const WORD_LANGUAGES: &[(Language, &[&str])] = &[
    (Language::English, ENGLISH),
    (Language::Indonesian, INDONESIAN),
    (Language::Italian, ITALIAN),
    (Language::Spanish, SPANISH),
    (Language::French, FRENCH),
    (Language::German, GERMAN),
    (Language::Portuguese, PORTUGUESE),
];

fn confidence_for(matches: usize) -> f64 {
    (0.5 + 0.1 * matches as f64).min(1.0)
}

/// Share of non-whitespace characters outside ASCII, ignoring scientific symbols.
pub fn non_ascii_ratio(text: &str) -> f64 {
    let mut total = 0usize;
    let mut foreign = 0usize;
    for ch in text.chars().filter(|c| !c.is_whitespace()) {
        total += 1;
        if !ch.is_ascii() && !SCIENTIFIC_SYMBOLS.contains(&ch) {
            foreign += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }
    foreign as f64 / total as f64
}

/// Best-effort language classification. Never fails.
pub fn detect_language(text: &str) -> LanguageReport {
    let tokens: BTreeSet<String> = whitespace_tokens(text).into_iter().collect();

    let mut best: Option<(Language, Vec<String>)> = None;
    for (language, vocabulary) in WORD_LANGUAGES {
        let matched: Vec<String> = vocabulary
            .iter()
            .filter(|w| tokens.contains(**w))
            .map(|w| w.to_string())
            .collect();
        if matched.len() < MIN_INDICATOR_MATCHES {
            continue;
        }
        let better = best
            .as_ref()
            .map_or(true, |(_, current)| matched.len() > current.len());
        if better {
            best = Some((*language, matched));
        }
    }

    let cjk: Vec<String> = CHINESE
        .iter()
        .filter(|c| text.contains(**c))
        .map(|c| c.to_string())
        .collect();
    if cjk.len() >= MIN_INDICATOR_MATCHES
        && best.as_ref().map_or(true, |(_, current)| cjk.len() > current.len())
    {
        best = Some((Language::Chinese, cjk));
    }

    if let Some((language, indicators)) = best {
        return LanguageReport {
            language,
            confidence: confidence_for(indicators.len()),
            indicators,
        };
    }

    if non_ascii_ratio(text) > NON_ASCII_RATIO_LIMIT {
        return LanguageReport {
            language: Language::UnknownNonEnglish,
            confidence: NON_ASCII_CONFIDENCE,
            indicators: Vec::new(),
        };
    }

    let english: Vec<String> = ENGLISH
        .iter()
        .filter(|w| tokens.contains(**w))
        .map(|w| w.to_string())
        .collect();
    // Technical jargon can lack function words; keep a weak English default.
    let confidence = if english.len() >= 2 { 0.9 } else { 0.6 };
    LanguageReport {
        language: Language::English,
        confidence,
        indicators: english,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_english() {
        let report = detect_language("The laser removes rust from the panel and it is fast.");
        assert_eq!(report.language, Language::English);
        assert!(report.confidence >= 0.8);
        assert!(report.indicators.contains(&"the".to_string()));
    }

    #[test]
    fn test_detects_indonesian() {
        let report = detect_language(
            "Proses ini sangat efektif untuk membersihkan permukaan logam dengan cepat dan aman.",
        );
        assert_eq!(report.language, Language::Indonesian);
        assert!(report.confidence > 0.7);
    }

    #[test]
    fn test_detects_chinese_characters() {
        let report = detect_language("这是一个测试，我们在实验室里也做了清洗。");
        assert_eq!(report.language, Language::Chinese);
    }

    #[test]
    fn test_non_ascii_fallback() {
        let report = detect_language("ラーメンはとてもおいしいです");
        assert_eq!(report.language, Language::UnknownNonEnglish);
        assert!(report.confidence > 0.7);
    }

    #[test]
    fn test_scientific_symbols_are_not_foreign() {
        let text = "Pulse 1064 nm, 25 °C, ±2 µm, 10³ W at spot.";
        assert!(non_ascii_ratio(text) < 0.01);
        let report = detect_language(text);
        assert_eq!(report.language, Language::English);
        assert_eq!(report.confidence, 0.6);
    }

    #[test]
    fn test_two_function_words_give_strong_default() {
        let report = detect_language("Cleaning of stainless steel parts");
        assert_eq!(report.language, Language::English);
        assert_eq!(report.confidence, 0.6);

        let report = detect_language("Cleaning of steel is quick");
        assert_eq!(report.confidence, 0.9);
    }
}
