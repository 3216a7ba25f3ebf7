//! English stop-word list and filtering.

/// Words shorter than this are dropped by default.
pub const DEFAULT_MIN_WORD_LENGTH: usize = 3;

/// Common English function words excluded from scoring and keyword counts.
///
/// Entries are lower-case. Two-letter words are listed even though the default
/// minimum length already drops them, so the list stays usable with a lower
/// `min_length`.
pub const DEFAULT_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "all", "also", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "both", "but", "by", "can",
    "could", "did", "do", "does", "doing", "each", "for", "from", "had", "has", "have",
    "having", "he", "her", "here", "hers", "him", "his", "how", "i", "if", "in", "into", "is",
    "it", "its", "just", "me", "more", "most", "my", "no", "nor", "not", "of", "off", "on",
    "only", "or", "other", "our", "ours", "out", "over", "own", "she", "should", "so", "some",
    "such", "than", "that", "the", "their", "them", "then", "there", "these", "they", "this",
    "those", "to", "too", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your",
];

/// Case-insensitive membership test against a stop list.
pub fn is_stop_word(word: &str, stop_list: &[&str]) -> bool {
    stop_list.iter().any(|stop| {
        stop.chars()
            .flat_map(char::to_lowercase)
            .eq(word.chars().flat_map(char::to_lowercase))
    })
}

/// Whether `word` survives filtering: not a stop word and at least
/// `min_length` characters long.
pub fn is_significant(word: &str, stop_list: &[&str], min_length: usize) -> bool {
    word.chars().count() >= min_length && !is_stop_word(word, stop_list)
}

/// Remove stop words and short words.
///
/// Survivors keep their original casing and order.
pub fn filter_stop_words<S: AsRef<str>>(
    words: &[S],
    stop_list: &[&str],
    min_length: usize,
) -> Vec<String> {
    words
        .iter()
        .map(AsRef::as_ref)
        .filter(|word| is_significant(word, stop_list, min_length))
        .map(str::to_string)
        .collect()
}

/// [`filter_stop_words`] with [`DEFAULT_STOP_WORDS`] and
/// [`DEFAULT_MIN_WORD_LENGTH`].
pub fn filter_default_stop_words<S: AsRef<str>>(words: &[S]) -> Vec<String> {
    filter_stop_words(words, DEFAULT_STOP_WORDS, DEFAULT_MIN_WORD_LENGTH)
}
