// Text Processing Service
// Normalization, segmentation and small statistics shared by every detector

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

fn space_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\u{3000}\u{00A0}]").expect("space regex"))
}

fn horizontal_ws_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t\x0C\x0B]+").expect("whitespace regex"))
}

fn paragraph_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n").expect("paragraph regex"))
}

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\p{L}\p{N}]+(?:'[\p{L}]+)*").expect("word regex"))
}

/// Normalize quotes, dashes, exotic spaces and line endings.
/// Line structure is kept so paragraph boundaries survive.
pub fn normalize_punctuation(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let s = text
        .replace(['\u{201c}', '\u{201d}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace('\u{2014}', "-");

    let s = space_re().replace_all(&s, " ");
    let s = s.replace("\r\n", "\n").replace('\r', "\n");
    let s = horizontal_ws_re().replace_all(&s, " ");

    s.lines()
        .map(|ln| ln.trim())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Lower-cased word tokens (letters/digits with inner apostrophes).
pub fn words(text: &str) -> Vec<String> {
    word_re()
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

pub fn word_count(text: &str) -> usize {
    word_re().find_iter(text).count()
}

/// Whitespace-delimited tokens, lower-cased and stripped of surrounding punctuation.
pub fn whitespace_tokens(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|t| {
            t.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|t| !t.is_empty())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceSpan {
    pub text: String,
    /// UTF-8 byte offset into the analyzed text.
    pub start: usize,
    /// UTF-8 byte offset, end-exclusive.
    pub end: usize,
}

impl SentenceSpan {
    pub fn word_count(&self) -> usize {
        word_count(&self.text)
    }

    pub fn first_word(&self) -> Option<String> {
        word_re()
            .find(&self.text)
            .map(|m| m.as_str().to_lowercase())
    }
}

fn is_terminal(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?' | '。' | '！' | '？')
}

/// Split text into sentences on terminal punctuation and blank lines.
/// Decimal points ("3.5") do not end a sentence.
pub fn split_sentences(text: &str) -> Vec<SentenceSpan> {
    let mut sentences = Vec::new();
    if text.trim().is_empty() {
        return sentences;
    }

    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut current_start = 0usize;
    let mut i = 0usize;

    let push = |start: usize, end: usize, out: &mut Vec<SentenceSpan>| {
        let slice = &text[start..end];
        let trimmed = slice.trim();
        if trimmed.is_empty() {
            return;
        }
        let lead = slice.len() - slice.trim_start().len();
        out.push(SentenceSpan {
            text: trimmed.to_string(),
            start: start + lead,
            end: start + lead + trimmed.len(),
        });
    };

    while i < chars.len() {
        let (pos, ch) = chars[i];

        if ch == '\n' && i + 1 < chars.len() && chars[i + 1].1 == '\n' {
            push(current_start, pos, &mut sentences);
            current_start = pos;
            i += 1;
            continue;
        }

        if is_terminal(ch) {
            if ch == '.' && i > 0 && i + 1 < chars.len() {
                let prev = chars[i - 1].1;
                let next = chars[i + 1].1;
                if prev.is_ascii_digit() && next.is_ascii_digit() {
                    i += 1;
                    continue;
                }
            }

            // Swallow runs like "?!" or "..." and a closing quote.
            let mut j = i + 1;
            while j < chars.len() && (is_terminal(chars[j].1) || chars[j].1 == '"') {
                j += 1;
            }
            let end = if j < chars.len() { chars[j].0 } else { text.len() };
            push(current_start, end, &mut sentences);
            current_start = end;
            i = j;
            continue;
        }

        i += 1;
    }

    if current_start < text.len() {
        push(current_start, text.len(), &mut sentences);
    }

    sentences
}

/// Split on blank lines, dropping empty paragraphs.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    paragraph_re()
        .split(text)
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(|p| p.to_string())
        .collect()
}

/// Case-insensitive occurrence count of `phrase` bounded by non-alphanumerics.
/// `haystack_lower` must already be lower-cased.
pub fn count_phrase(haystack_lower: &str, phrase: &str) -> usize {
    let needle = phrase.trim().to_lowercase();
    if needle.is_empty() {
        return 0;
    }

    let mut count = 0;
    let mut from = 0;
    while let Some(found) = haystack_lower[from..].find(&needle) {
        let start = from + found;
        let end = start + needle.len();
        let before_ok = haystack_lower[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack_lower[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        if before_ok && after_ok {
            count += 1;
        }
        from = end;
    }
    count
}

/// Up to `radius` characters either side of a byte range, for issue evidence.
pub fn context_snippet(text: &str, start: usize, end: usize, radius: usize) -> String {
    let before: String = text[..start]
        .chars()
        .rev()
        .take(radius)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    let after: String = text[end..].chars().take(radius).collect();
    format!("{}{}{}", before, &text[start..end], after)
        .replace('\n', " ")
        .trim()
        .to_string()
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Population standard deviation over mean. `None` when undefined.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    let m = mean(values);
    if values.is_empty() || m <= 0.0 {
        return None;
    }
    Some(std_dev(values) / m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_punctuation() {
        let input = "It\u{2019}s  \u{201c}fine\u{201d}\r\n\r\nNext\u{00A0}line";
        let output = normalize_punctuation(input);
        assert_eq!(output, "It's \"fine\"\n\nNext line");
    }

    #[test]
    fn test_words_keep_contractions() {
        let tokens = words("We don't stop. It's 2 o'clock!");
        assert_eq!(tokens, vec!["we", "don't", "stop", "it's", "2", "o'clock"]);
    }

    #[test]
    fn test_split_sentences_skips_decimals() {
        let text = "The ratio is 3.5 today. Really? Yes!";
        let sentences = split_sentences(text);
        assert_eq!(sentences.len(), 3);
        assert_eq!(sentences[0].text, "The ratio is 3.5 today.");
        assert_eq!(sentences[1].text, "Really?");
        assert_eq!(&text[sentences[2].start..sentences[2].end], "Yes!");
    }

    #[test]
    fn test_split_sentences_breaks_on_blank_lines() {
        let text = "Heading without stop\n\nBody sentence here.";
        let sentences = split_sentences(text);
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].text, "Heading without stop");
    }

    #[test]
    fn test_split_paragraphs() {
        let paragraphs = split_paragraphs("First.\n\n\nSecond.\n \nThird.");
        assert_eq!(paragraphs, vec!["First.", "Second.", "Third."]);
    }

    #[test]
    fn test_count_phrase_respects_boundaries() {
        let hay = "the results speak. results matter; multiresults do not.";
        assert_eq!(count_phrase(hay, "results"), 2);
        assert_eq!(count_phrase(hay, "Results Speak"), 1);
        assert_eq!(count_phrase(hay, ""), 0);
    }

    #[test]
    fn test_coefficient_of_variation() {
        assert_eq!(coefficient_of_variation(&[]), None);
        assert_eq!(coefficient_of_variation(&[5.0, 5.0, 5.0]), Some(0.0));
        let cv = coefficient_of_variation(&[2.0, 4.0, 6.0]).unwrap();
        assert!((cv - 0.408248).abs() < 1e-4);
    }
}
