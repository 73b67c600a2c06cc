//! Lexer for generated report prose
//!
//! Splits an answer into sentence tokens and classifies the signals the
//! validator cares about: citation markers, headings/references, and
//! numeric/currency content. Report-style markdown breaks naive
//! `split('.')` — bullet lists, headings, and blank runs all need handling
//! before punctuation-based splitting is safe.

use once_cell::sync::Lazy;
use regex::Regex;

static CITATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(\d+)\]").expect("static regex is valid"));
// Bullet chars are unambiguous anywhere; `*`, `-`, and numbered markers
// only count at the start of a line.
static BULLET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:[*\-]|\d+\.)\s+|•\s*").expect("static regex is valid")
});
static BLANK_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{2,}").expect("static regex is valid"));

/// Classification of a sentence token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentenceKind {
    /// Markdown heading line.
    Heading,
    /// References/bibliography line.
    Reference,
    /// Ordinary prose.
    Prose,
}

/// One segmented sentence with its extracted signals.
#[derive(Debug, Clone)]
pub struct SentenceToken {
    pub text: String,
    pub kind: SentenceKind,
    pub citations: Vec<i64>,
    pub has_numeric_signal: bool,
}

impl SentenceToken {
    fn classify(text: &str) -> SentenceKind {
        if text.trim_start().starts_with('#') {
            SentenceKind::Heading
        } else if text.contains("References") || text.contains("참고") {
            SentenceKind::Reference
        } else {
            SentenceKind::Prose
        }
    }
}

/// Extract all `[n]` citation ids from a piece of text, in order.
pub fn extract_citations(text: &str) -> Vec<i64> {
    CITATION_RE
        .captures_iter(text)
        .filter_map(|c| c[1].parse().ok())
        .collect()
}

/// Remove citation markers, leaving the bare claim text.
pub fn strip_citations(text: &str) -> String {
    CITATION_RE.replace_all(text, "").trim().to_string()
}

/// Whether a sentence carries a factual numeric signal: a digit, percent
/// sign, or currency symbol.
fn has_numeric_signal(text: &str) -> bool {
    text.chars()
        .any(|c| c.is_ascii_digit() || c == '%' || c == '$' || c == '€' || c == '₩')
}

/// Split a line on sentence-ending punctuation followed by whitespace.
fn split_on_punctuation(line: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            if chars.peek().map(|n| n.is_whitespace()).unwrap_or(false) {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    sentences.push(trimmed.to_string());
                }
                current.clear();
                // Consume the delimiting whitespace run.
                while chars.peek().map(|n| n.is_whitespace()).unwrap_or(false) {
                    chars.next();
                }
            }
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    sentences
}

/// Segment answer text into classified sentence tokens.
///
/// Line breaks are normalized, bullet markers become line breaks, blank runs
/// collapse, and each remaining line splits on terminal punctuation.
pub fn segment(text: &str) -> Vec<SentenceToken> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let normalized = text.replace("\r\n", "\n");
    let bulleted = BULLET_RE.replace_all(&normalized, "\n");
    let collapsed = BLANK_RUN_RE.replace_all(&bulleted, "\n");

    collapsed
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .flat_map(|line| split_on_punctuation(line))
        .map(|sentence| {
            let kind = SentenceToken::classify(&sentence);
            let citations = extract_citations(&sentence);
            let has_numeric_signal = has_numeric_signal(&sentence);
            SentenceToken {
                text: sentence,
                kind,
                citations,
                has_numeric_signal,
            }
        })
        .collect()
}
