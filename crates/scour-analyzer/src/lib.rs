//! Token stream producer (§4.6): language-aware segmentation, lowercasing,
//! stop-word filtering. Deterministic — the same input always yields the
//! same ordered token list, with no deduplication (duplicate tokens are
//! kept so callers can compute term frequency and positions downstream,
//! per §4.7).

use std::collections::HashSet;

use once_cell::sync::Lazy;

const ENGLISH_STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is",
    "it", "its", "of", "on", "that", "the", "to", "was", "were", "will", "with", "this", "but",
    "or", "not", "have", "had", "they", "you", "we", "i", "if", "so", "do", "does", "did", "can",
    "could", "would", "should", "about", "into", "than", "then", "there", "their", "which",
];

const JAPANESE_STOPWORDS: &[&str] = &[
    "の", "は", "が", "を", "に", "で", "と", "も", "な", "です", "ます", "これ", "それ",
    "あれ", "する", "いる", "ある", "こと", "もの", "から", "まで", "へ", "や", "か", "だ",
];

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ENGLISH_STOPWORDS
        .iter()
        .chain(JAPANESE_STOPWORDS.iter())
        .copied()
        .collect()
});

/// Hiragana, Katakana and CJK Unified Ideograph ranges (§4.6).
fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x3040..=0x309F | 0x30A0..=0x30FF | 0x4E00..=0x9FFF)
}

fn contains_cjk(text: &str) -> bool {
    text.chars().any(is_cjk)
}

/// Analyzes free text into an ordered, lowercased, stop-word-filtered
/// token list. CJK runs are segmented in "short-unit" mode; everything
/// else is split on runs of alphanumeric characters.
///
/// There is no full morphological dictionary segmenter in this
/// workspace's dependency stack (§4.6 supplement), so CJK short units are
/// approximated as fixed-width two-codepoint chunks per maximal CJK run —
/// a standard degrade-gracefully behavior when a dictionary segmenter is
/// unavailable.
pub fn analyze(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut raw_tokens: Vec<String> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if is_cjk(c) {
            let start = i;
            while i < chars.len() && is_cjk(chars[i]) {
                i += 1;
            }
            raw_tokens.extend(short_units(&chars[start..i]));
        } else if c.is_alphanumeric() {
            let start = i;
            while i < chars.len() && chars[i].is_alphanumeric() && !is_cjk(chars[i]) {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect::<String>().to_lowercase();
            raw_tokens.push(word);
        } else {
            i += 1;
        }
    }

    raw_tokens.retain(|t| !t.is_empty() && !STOPWORDS.contains(t.as_str()));
    raw_tokens
}

fn short_units(run: &[char]) -> Vec<String> {
    let mut units = Vec::with_capacity(run.len().div_ceil(2));
    let mut j = 0;
    while j < run.len() {
        let end = (j + 2).min(run.len());
        units.push(run[j..end].iter().collect());
        j = end;
    }
    units
}

/// Whether `analyze` would invoke the CJK segmenter for this text, exposed
/// for callers that want to branch on the language mode.
pub fn is_cjk_text(text: &str) -> bool {
    contains_cjk(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_strips_stopwords() {
        let tokens = analyze("The Cat Sat on a Mat");
        assert_eq!(tokens, vec!["cat", "sat", "mat"]);
    }

    #[test]
    fn deterministic_for_same_input() {
        let a = analyze("Rust web crawler indexing engine");
        let b = analyze("Rust web crawler indexing engine");
        assert_eq!(a, b);
    }

    #[test]
    fn preserves_order_and_duplicates() {
        let tokens = analyze("python guide python rust guide");
        assert_eq!(tokens, vec!["python", "guide", "python", "rust", "guide"]);
    }

    #[test]
    fn segments_cjk_runs_into_bigrams() {
        let tokens = analyze("東京都渋谷区");
        assert!(tokens.iter().all(|t| t.chars().count() <= 2));
        assert!(!tokens.is_empty());
    }

    /// Bigram segmentation means a single-codepoint stop word like "が"
    /// can only ever be filtered if it happens to land alone on a bigram
    /// boundary with nothing to its right — it never appears as a token
    /// on its own otherwise, so asserting its absence from arbitrary text
    /// would pass vacuously. Pick a run where a two-codepoint stop word
    /// ("これ", "です") lines up exactly on a bigram boundary instead, so
    /// the filter is actually exercised.
    #[test]
    fn cjk_stopwords_are_filtered() {
        let tokens = analyze("これは猫です");
        assert!(!tokens.contains(&"これ".to_string()));
        assert!(!tokens.contains(&"です".to_string()));
        assert_eq!(tokens, vec!["は猫".to_string()]);
    }

    #[test]
    fn mixed_script_text_splits_both_ways() {
        let tokens = analyze("Rust東京guide");
        assert!(tokens.contains(&"rust".to_string()));
        assert!(tokens.contains(&"guide".to_string()));
    }

    #[test]
    fn empty_text_yields_no_tokens() {
        assert!(analyze("").is_empty());
        assert!(analyze("   !!! ...").is_empty());
    }
}
