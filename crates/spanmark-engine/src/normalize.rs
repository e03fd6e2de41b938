//! Deterministic text normalization helpers.
//!
//! Everything here is matching-only and intentionally lossy: lowercased,
//! punctuation treated as separators, stopwords dropped. Display text is
//! never produced from these functions.

use std::collections::{BTreeMap, BTreeSet};

/// Common function words excluded from significant-word extraction.
const STOPWORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be", "been",
    "but", "by", "can", "could", "did", "do", "does", "for", "from", "had", "has", "have", "he",
    "her", "his", "if", "in", "into", "is", "it", "its", "just", "more", "most", "not", "of", "on",
    "or", "other", "our", "out", "over", "she", "so", "some", "such", "than", "that", "the",
    "their", "them", "then", "there", "these", "they", "this", "to", "was", "we", "were", "what",
    "when", "which", "will", "with", "would", "you", "your",
];

/// Stricter list for anchor/context scoring: only ≥4-char function words
/// matter there, and fewer of them are excluded so genuinely specific words
/// survive.
const STRICT_STOPWORDS: &[&str] = &[
    "about", "after", "also", "been", "could", "does", "from", "have", "into", "just", "more",
    "most", "other", "over", "some", "such", "than", "that", "their", "them", "then", "there",
    "these", "they", "this", "were", "what", "when", "which", "will", "with", "would", "your",
];

fn is_stopword(word: &str) -> bool {
    STOPWORDS.binary_search(&word).is_ok()
}

fn is_strict_stopword(word: &str) -> bool {
    STRICT_STOPWORDS.binary_search(&word).is_ok()
}

/// Collapse any whitespace run (spaces, tabs, newlines) to a single space
/// and trim the ends.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercased alphanumeric tokens in order of appearance.
pub fn tokenize(text: &str) -> Vec<String> {
    tokenize_with_offsets(text).into_iter().map(|(t, _)| t).collect()
}

/// Like [`tokenize`], but each token carries the char offset of its first
/// character. Offsets are into the input text, not the lowercased token.
pub fn tokenize_with_offsets(text: &str) -> Vec<(String, usize)> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut start = 0usize;
    for (i, ch) in text.chars().enumerate() {
        if ch.is_alphanumeric() {
            if cur.is_empty() {
                start = i;
            }
            for lc in ch.to_lowercase() {
                cur.push(lc);
            }
        } else if !cur.is_empty() {
            out.push((std::mem::take(&mut cur), start));
        }
    }
    if !cur.is_empty() {
        out.push((cur, start));
    }
    out
}

/// Informative word multiset: tokens of at least `min_len` chars minus
/// stopwords, with counts so repeated informative words weigh more.
pub fn significant_words(s: &str, min_len: usize) -> BTreeMap<String, usize> {
    let min_len = min_len.clamp(2, 4);
    let mut out = BTreeMap::new();
    for tok in tokenize(s) {
        if tok.chars().count() < min_len || is_stopword(&tok) {
            continue;
        }
        *out.entry(tok).or_insert(0) += 1;
    }
    out
}

/// Highly specific words only: ≥4 chars, strict stopword list. Used for
/// anchor/context scoring where generic words must not count.
pub fn distinctive_words(s: &str) -> BTreeSet<String> {
    tokenize(s)
        .into_iter()
        .filter(|t| t.chars().count() >= 4 && !is_strict_stopword(t))
        .collect()
}

/// A sentence-sized region of a flat text, in character offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

pub(crate) fn is_sentence_terminator(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?' | '\n')
}

/// Split on `. ! ? \n`, skipping fragments whose trimmed text is ≤ 10 chars.
///
/// Offsets cover the trimmed sentence text (terminator excluded), so
/// highlighted spans align to natural boundaries.
pub fn split_sentences(s: &str) -> Vec<Sentence> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut buf_start = 0usize;
    let mut pos = 0usize;

    let flush = |buf: &mut String, buf_start: usize, out: &mut Vec<Sentence>| {
        let trimmed = buf.trim();
        if trimmed.chars().count() > 10 {
            let lead_ws = buf.chars().take_while(|c| c.is_whitespace()).count();
            let start = buf_start + lead_ws;
            out.push(Sentence {
                text: trimmed.to_string(),
                start,
                end: start + trimmed.chars().count(),
            });
        }
        buf.clear();
    };

    for ch in s.chars() {
        if is_sentence_terminator(ch) {
            flush(&mut buf, buf_start, &mut out);
            buf_start = pos + 1;
        } else {
            buf.push(ch);
        }
        pos += 1;
    }
    flush(&mut buf, buf_start, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopword_tables_are_sorted_for_binary_search() {
        let mut sorted = STOPWORDS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, STOPWORDS);
        let mut strict = STRICT_STOPWORDS.to_vec();
        strict.sort_unstable();
        assert_eq!(strict, STRICT_STOPWORDS);
    }

    #[test]
    fn normalize_whitespace_collapses_runs_and_trims() {
        assert_eq!(normalize_whitespace("  a\t\tb\n\nc  "), "a b c");
        assert_eq!(normalize_whitespace(""), "");
        assert_eq!(normalize_whitespace(" \n "), "");
    }

    #[test]
    fn significant_words_drops_short_tokens_and_stopwords() {
        let words = significant_words("The quick brown fox is on the run", 3);
        assert!(words.contains_key("quick"));
        assert!(words.contains_key("brown"));
        assert!(words.contains_key("run"));
        assert!(!words.contains_key("the"), "stopword kept");
        assert!(!words.contains_key("is"), "short token kept");
        assert!(!words.contains_key("on"));
    }

    #[test]
    fn significant_words_counts_repeats() {
        let words = significant_words("alpha alpha beta", 3);
        assert_eq!(words.get("alpha"), Some(&2));
        assert_eq!(words.get("beta"), Some(&1));
    }

    #[test]
    fn distinctive_words_requires_four_chars() {
        let words = distinctive_words("fox jumps over the lazy dog again");
        assert!(words.contains("jumps"));
        assert!(words.contains("lazy"));
        assert!(words.contains("again"));
        assert!(!words.contains("fox"), "3-char token kept");
        assert!(!words.contains("over"), "strict stopword kept");
    }

    #[test]
    fn split_sentences_reports_char_offsets_of_trimmed_text() {
        let s = "First sentence here. Tiny. Second sentence follows!";
        let sentences = split_sentences(s);
        assert_eq!(sentences.len(), 2, "short fragment not skipped: {sentences:?}");
        assert_eq!(sentences[0].text, "First sentence here");
        assert_eq!(sentences[0].start, 0);
        assert_eq!(sentences[0].end, 19);
        assert_eq!(sentences[1].text, "Second sentence follows");
        let expect_start = s.find("Second").unwrap();
        assert_eq!(sentences[1].start, expect_start);
    }

    #[test]
    fn split_sentences_treats_newline_as_boundary() {
        let s = "a line long enough to keep\nanother long enough line";
        let sentences = split_sentences(s);
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[1].text, "another long enough line");
    }

    #[test]
    fn split_sentences_empty_input() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("short. s. x!").is_empty());
    }
}
