//! Free-text query parsing.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use super::stopwords::filter_default_stop_words;

/// A double-quoted phrase.
static PHRASE_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""([^"]*)""#).unwrap());

/// A search query split into matchable units.
///
/// Everything is lower-cased; matching downstream is case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedQuery {
    /// Quoted phrases, in query order. Duplicates are kept.
    pub phrases: Vec<String>,
    /// Remaining words with stop words and short words removed.
    pub words: Vec<String>,
}

impl ParsedQuery {
    /// True when the query has nothing to match.
    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty() && self.words.is_empty()
    }

    /// Phrases followed by words.
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.phrases
            .iter()
            .chain(self.words.iter())
            .map(String::as_str)
    }
}

/// Parse a raw query.
///
/// - `"botanical society" plants` → phrases `["botanical society"]`, words `["plants"]`
/// - `go to uk plants` → words `["plants"]`
///
/// An unmatched quote is dropped and the text after it is treated as words.
pub fn parse_query(raw: &str) -> ParsedQuery {
    let lowered = raw.to_lowercase();

    let phrases: Vec<String> = PHRASE_PATTERN
        .captures_iter(&lowered)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|phrase| !phrase.is_empty())
        .collect();

    let remainder = PHRASE_PATTERN.replace_all(&lowered, " ");
    let tokens: Vec<&str> = remainder
        .split_whitespace()
        .map(|token| token.trim_matches('"'))
        .filter(|token| !token.is_empty())
        .collect();

    ParsedQuery {
        phrases,
        words: filter_default_stop_words(&tokens),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phrase_and_word() {
        let parsed = parse_query(r#""botanical society" plants"#);
        assert_eq!(parsed.phrases, vec!["botanical society"]);
        assert_eq!(parsed.words, vec!["plants"]);
    }

    #[test]
    fn test_short_words_dropped() {
        let parsed = parse_query("go to uk plants");
        assert!(parsed.phrases.is_empty());
        assert_eq!(parsed.words, vec!["plants"]);
    }

    #[test]
    fn test_lowercases_everything() {
        let parsed = parse_query(r#"  "Wild FLOWERS "  Orchids"#);
        assert_eq!(parsed.phrases, vec!["wild flowers"]);
        assert_eq!(parsed.words, vec!["orchids"]);
    }

    #[test]
    fn test_multiple_and_duplicate_phrases() {
        let parsed = parse_query(r#""red list" moss "red list" "ferns""#);
        assert_eq!(parsed.phrases, vec!["red list", "red list", "ferns"]);
        assert_eq!(parsed.words, vec!["moss"]);
    }

    #[test]
    fn test_only_stop_words_is_empty() {
        let parsed = parse_query("the and of it");
        assert!(parsed.is_empty());
        assert!(parse_query("").is_empty());
        assert!(parse_query(r#""""#).is_empty());
    }

    #[test]
    fn test_unmatched_quote() {
        let parsed = parse_query(r#"heath "moorland"#);
        assert!(parsed.phrases.is_empty());
        assert_eq!(parsed.words, vec!["heath", "moorland"]);
    }

    #[test]
    fn test_terms_order() {
        let parsed = parse_query(r#"grasses "sedge meadow""#);
        let terms: Vec<&str> = parsed.terms().collect();
        assert_eq!(terms, vec!["sedge meadow", "grasses"]);
    }
}
