//! Keyword frequency extraction over a batch of queries.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::stopwords::{is_significant, DEFAULT_MIN_WORD_LENGTH, DEFAULT_STOP_WORDS};

/// Number of keywords returned by [`extract_default_keyword_counts`].
pub const DEFAULT_KEYWORD_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordCount {
    pub keyword: String,
    pub count: usize,
}

/// Count significant keywords across `queries`.
///
/// Tokens are lower-cased and stripped of anything that is not a letter or
/// digit. Results are sorted by descending count; equal counts keep the order
/// in which the keyword was first seen.
pub fn extract_keyword_counts<S: AsRef<str>>(
    queries: &[S],
    stop_list: &[&str],
    limit: usize,
) -> Vec<KeywordCount> {
    let mut counts: Vec<KeywordCount> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for query in queries {
        let query = query.as_ref().trim().to_lowercase();
        if query.is_empty() {
            continue;
        }

        for token in query.split_whitespace() {
            let keyword: String = token.chars().filter(|c| c.is_alphanumeric()).collect();
            if keyword.is_empty()
                || !is_significant(&keyword, stop_list, DEFAULT_MIN_WORD_LENGTH)
            {
                continue;
            }

            match positions.get(&keyword) {
                Some(&idx) => counts[idx].count += 1,
                None => {
                    positions.insert(keyword.clone(), counts.len());
                    counts.push(KeywordCount { keyword, count: 1 });
                }
            }
        }
    }

    // Stable sort keeps first-seen order between equal counts
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(limit);
    counts
}

/// [`extract_keyword_counts`] with the default stop list and limit.
pub fn extract_default_keyword_counts<S: AsRef<str>>(queries: &[S]) -> Vec<KeywordCount> {
    extract_keyword_counts(queries, DEFAULT_STOP_WORDS, DEFAULT_KEYWORD_LIMIT)
}
