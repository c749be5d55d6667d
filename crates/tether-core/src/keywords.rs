//! Keyword extraction for alignment scoring.
//!
//! Feature descriptions, step descriptions, and observed activity text are
//! all reduced to keyword sets before comparison. Matching is exact token
//! overlap; no stemming or substring matching is applied, so "auth" and
//! "authentication" are distinct tokens.

use std::collections::HashSet;

/// Common English and filler words excluded from keyword sets.
///
/// Deliberately short: generic dev verbs like "fix" and "add" stay in,
/// since they carry signal when a feature is phrased as "Fix login timeout".
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "this", "that", "from", "are", "was", "were", "has", "have",
    "had", "will", "would", "could", "should", "can", "may", "might", "must", "not", "you", "all",
    "its", "also", "than", "then", "them", "they", "there", "here", "when", "where", "which",
    "while", "into", "onto", "out", "our", "your", "been", "being", "does", "did", "each", "how",
    "more", "most", "other", "some", "such", "only", "own", "same", "too", "very", "just", "any",
    "about", "after", "before", "between", "both", "but", "use", "using", "used", "new", "via",
];

/// Extracts the keyword set from free text.
///
/// Text is lowercased and split on every non-alphanumeric character, so
/// `session_timeout.go` yields `session` and `timeout`. Tokens shorter than
/// three characters, tokens not starting with a letter, and stopwords are
/// dropped.
pub fn extract_keywords(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| token.len() >= 3)
        .filter(|token| token.starts_with(|c: char| c.is_ascii_alphabetic()))
        .filter(|token| !STOPWORDS.contains(token))
        .map(String::from)
        .collect()
}

/// Fraction of `reference` keywords that also occur in `candidate`.
///
/// Returns zero when the reference set is empty.
pub fn overlap_ratio(reference: &HashSet<String>, candidate: &HashSet<String>) -> f64 {
    let matched = reference.intersection(candidate).count();
    matched as f64 / reference.len().max(1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(words: &[&str]) -> HashSet<String> {
        words.iter().map(|w| (*w).to_string()).collect()
    }

    #[test]
    fn test_extract_lowercases_and_splits_on_punctuation() {
        let keywords = extract_keywords("src/auth/session_timeout.go");
        assert_eq!(keywords, set(&["src", "auth", "session", "timeout"]));
    }

    #[test]
    fn test_extract_drops_short_tokens_and_stopwords() {
        let keywords = extract_keywords("Fix the login timeout in db.rs");
        // "the" is a stopword, "in", "db", "rs" are too short
        assert_eq!(keywords, set(&["fix", "login", "timeout"]));
    }

    #[test]
    fn test_extract_drops_numeric_leading_tokens() {
        let keywords = extract_keywords("migrate 401errors to 500s");
        assert_eq!(keywords, set(&["migrate"]));
    }

    #[test]
    fn test_extract_empty_text() {
        assert!(extract_keywords("").is_empty());
        assert!(extract_keywords("a of to").is_empty());
    }

    #[test]
    fn test_overlap_ratio() {
        let reference = set(&["fix", "login", "timeout"]);
        let candidate = set(&["src", "auth", "session", "timeout"]);
        let ratio = overlap_ratio(&reference, &candidate);
        assert!((ratio - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_overlap_ratio_empty_reference() {
        let reference = HashSet::new();
        let candidate = set(&["anything"]);
        assert_eq!(overlap_ratio(&reference, &candidate), 0.0);
    }

    #[test]
    fn test_no_substring_matching() {
        // Exact token overlap only: "auth" does not match "authentication"
        let reference = extract_keywords("Add authentication middleware");
        let candidate = extract_keywords("src/auth/middleware.rs");
        let matched = reference.intersection(&candidate).count();
        assert_eq!(matched, 1); // only "middleware"
    }
}
