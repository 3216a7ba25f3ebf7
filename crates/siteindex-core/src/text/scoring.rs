//! Weighted field relevance scoring.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::query::{parse_query, ParsedQuery};
use crate::config::ScoringConfig;

/// Per-field score multipliers. Fields without an entry weigh
/// [`ScoringConfig::DEFAULT_FIELD_WEIGHT`].
pub type FieldWeights = HashMap<String, i64>;

/// Relevance of one document against one query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Total occurrences of phrases and words.
    pub hits: i64,
    /// Weighted score.
    pub score: i64,
}

impl ScoreResult {
    pub fn is_match(&self) -> bool {
        self.score > 0
    }
}

/// Non-overlapping occurrences of `needle` in `haystack`. Both are expected
/// lower-cased.
fn occurrences(haystack: &str, needle: &str) -> i64 {
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(needle).count() as i64
}

/// Score named text fields against a raw query.
///
/// ```
/// use siteindex::text::{score_fields, FieldWeights};
///
/// let weights = FieldWeights::from([("title".to_string(), 10)]);
/// let result = score_fields(
///     &[("title", "botanical society of britain")],
///     "\"botanical society\"",
///     &weights,
/// );
/// assert_eq!(result.score, 100);
/// assert_eq!(result.hits, 1);
/// ```
pub fn score_fields(fields: &[(&str, &str)], query: &str, weights: &FieldWeights) -> ScoreResult {
    score_parsed(fields, &parse_query(query), weights)
}

/// Score named text fields against an already parsed query.
///
/// - each phrase occurrence in a field adds `10 × weight`
/// - word occurrences in a field add up to a sub-score; when every query word
///   appears in that single field the sub-score is multiplied by 5; the
///   sub-score is then multiplied by the field weight
pub fn score_parsed(
    fields: &[(&str, &str)],
    query: &ParsedQuery,
    weights: &FieldWeights,
) -> ScoreResult {
    let mut result = ScoreResult::default();
    if query.is_empty() {
        return result;
    }

    for (name, text) in fields {
        if text.is_empty() {
            continue;
        }
        let weight = weights
            .get(*name)
            .copied()
            .unwrap_or(ScoringConfig::DEFAULT_FIELD_WEIGHT);
        let text = text.to_lowercase();

        for phrase in &query.phrases {
            let found = occurrences(&text, phrase);
            result.hits += found;
            result.score += found * ScoringConfig::PHRASE_MULTIPLIER * weight;
        }

        if query.words.is_empty() {
            continue;
        }
        let mut word_score = 0;
        let mut words_present = 0;
        for word in &query.words {
            let found = occurrences(&text, word);
            if found > 0 {
                words_present += 1;
            }
            word_score += found;
        }
        result.hits += word_score;
        if words_present == query.words.len() {
            word_score *= ScoringConfig::ALL_TERMS_BONUS;
        }
        result.score += word_score * weight;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn title_weight() -> FieldWeights {
        FieldWeights::from([("title".to_string(), 10)])
    }

    #[test]
    fn test_phrase_score() {
        let result = score_fields(
            &[("title", "botanical society of britain")],
            r#""botanical society""#,
            &title_weight(),
        );
        assert_eq!(result, ScoreResult { score: 100, hits: 1 });
    }

    #[test]
    fn test_all_words_in_one_field_bonus() {
        let result = score_fields(
            &[("title", "botanical society of britain")],
            "botanical society",
            &title_weight(),
        );
        assert_eq!(result, ScoreResult { score: 100, hits: 2 });
    }

    #[test]
    fn test_no_bonus_when_words_split_across_fields() {
        let result = score_fields(
            &[("title", "botanical notes"), ("body", "a society meeting")],
            "botanical society",
            &FieldWeights::new(),
        );
        // one hit in each field, no field has both words
        assert_eq!(result, ScoreResult { score: 2, hits: 2 });
    }

    #[test]
    fn test_case_insensitive_and_repeated() {
        let result = score_fields(
            &[("body", "Orchid orchid ORCHID")],
            "orchid",
            &FieldWeights::new(),
        );
        assert_eq!(result, ScoreResult { score: 15, hits: 3 });
    }

    #[test]
    fn test_empty_query_and_no_match() {
        let fields = [("title", "heathland survey")];
        assert_eq!(
            score_fields(&fields, "", &FieldWeights::new()),
            ScoreResult::default()
        );
        assert_eq!(
            score_fields(&fields, "the of", &FieldWeights::new()),
            ScoreResult::default()
        );
        let missed = score_fields(&fields, "woodland", &FieldWeights::new());
        assert_eq!(missed, ScoreResult::default());
        assert!(!missed.is_match());
    }

    #[test]
    fn test_phrase_and_words_combined() {
        let weights = FieldWeights::from([
            ("title".to_string(), 10),
            ("description".to_string(), 5),
        ]);
        let result = score_fields(
            &[
                ("title", "Wild flower walks"),
                ("description", "Guided walks to see wild flower meadows"),
                ("body", ""),
            ],
            r#""wild flower" meadows"#,
            &weights,
        );
        // phrase: title 1×10×10, description 1×10×5; word: description 1×5×5
        assert_eq!(result, ScoreResult { score: 175, hits: 3 });
    }
}
