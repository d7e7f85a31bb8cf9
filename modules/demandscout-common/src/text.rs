// Text canonicalization helpers shared by the normalizer, extractor, and
// clusterer. All pure functions; the canonical/normalized forms produced here
// are what cluster identity is derived from, so changes here change cluster
// ids across runs.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::Regex;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static NON_ALNUM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9\s]").unwrap());

/// Tokens carrying no demand meaning, dropped during normalization.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "how", "i", "if", "in", "is",
    "it", "my", "of", "on", "or", "that", "the", "this", "to", "we", "what", "with", "you", "your",
];

/// Anchor phrases keep at most this many unique tokens.
const MAX_ANCHOR_TOKENS: usize = 24;

/// Strip URLs and collapse runs of whitespace.
pub fn compact_text(text: &str) -> String {
    let without_urls = URL_RE.replace_all(text, " ");
    WHITESPACE_RE.replace_all(&without_urls, " ").trim().to_string()
}

/// Lowercase, strip punctuation, drop stopwords and short tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let stripped = NON_ALNUM_RE.replace_all(&lower, " ");
    stripped
        .split_whitespace()
        .filter(|t| t.chars().count() > 2 && !STOP_WORDS.contains(t))
        .map(|t| t.to_string())
        .collect()
}

/// Deterministic set-style view of a phrase: sorted unique tokens, capped.
/// Paraphrases and casing/punctuation variants normalize to the same anchor.
pub fn normalize_phrase(text: &str) -> String {
    let unique: BTreeSet<String> = tokenize(text).into_iter().collect();
    unique
        .into_iter()
        .take(MAX_ANCHOR_TOKENS)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Most frequent meaningful tokens, ties broken alphabetically.
pub fn keyword_tokens(text: &str, max_tokens: usize) -> Vec<String> {
    let mut counts: HashMap<String, u32> = HashMap::new();
    for token in tokenize(text) {
        *counts.entry(token).or_insert(0) += 1;
    }
    let mut ranked: Vec<(String, u32)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(max_tokens).map(|(t, _)| t).collect()
}

/// Jaccard overlap between two token sets. Returns 0.0 when either is empty.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

/// Split compacted text into sentences on `.`, `!`, `?` followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<String> {
    let clean = compact_text(text);
    if clean.is_empty() {
        return Vec::new();
    }
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = clean.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().is_some_and(|n| n.is_whitespace()) {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    sentences
}

/// Truncate to `max_len` characters with an ellipsis, on a char boundary.
pub fn shorten(text: &str, max_len: usize) -> String {
    let compacted = compact_text(text);
    if compacted.chars().count() <= max_len {
        return compacted;
    }
    let head: String = compacted.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", head.trim_end())
}

/// Hyphen-joined leading tokens, for human-readable id prefixes.
pub fn slugify(text: &str, max_words: usize) -> String {
    tokenize(text)
        .into_iter()
        .take(max_words)
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_strips_urls_and_whitespace() {
        let text = "check   this https://example.com/thing out\n\nplease";
        assert_eq!(compact_text(text), "check this out please");
    }

    #[test]
    fn normalize_collapses_case_and_punctuation() {
        let a = normalize_phrase("looking for a free tool to track invoices");
        let b = normalize_phrase("Looking for a FREE tool to track invoices!!");
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn normalize_drops_stopwords_and_short_tokens() {
        let norm = normalize_phrase("I am in it to win it");
        assert!(!norm.contains("i "));
        assert!(norm.contains("win"));
    }

    #[test]
    fn jaccard_identical_sets() {
        let a: BTreeSet<String> = ["tool", "free", "invoices"].iter().map(|s| s.to_string()).collect();
        assert!((jaccard(&a, &a) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn jaccard_disjoint_sets() {
        let a: BTreeSet<String> = ["tool"].iter().map(|s| s.to_string()).collect();
        let b: BTreeSet<String> = ["kitten"].iter().map(|s| s.to_string()).collect();
        assert!(jaccard(&a, &b).abs() < 1e-9);
    }

    #[test]
    fn jaccard_empty_set_is_zero() {
        let a: BTreeSet<String> = BTreeSet::new();
        let b: BTreeSet<String> = ["tool"].iter().map(|s| s.to_string()).collect();
        assert_eq!(jaccard(&a, &b), 0.0);
    }

    #[test]
    fn split_sentences_on_terminators() {
        let sentences = split_sentences("I need a tool. Does anyone know one? Thanks!");
        assert_eq!(sentences.len(), 3);
        assert_eq!(sentences[0], "I need a tool.");
    }

    #[test]
    fn shorten_long_text_adds_ellipsis() {
        let long = "word ".repeat(100);
        let short = shorten(&long, 40);
        assert!(short.chars().count() <= 40);
        assert!(short.ends_with("..."));
    }

    #[test]
    fn slugify_takes_leading_tokens() {
        assert_eq!(slugify("looking for a free invoice tool", 3), "looking-free-invoice");
    }
}
