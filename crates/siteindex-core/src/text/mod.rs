//! Text relevance engine.
//!
//! Pure functions over strings:
//! - Query parsing into quoted phrases and significant words
//! - Stop-word filtering
//! - Weighted field scoring
//! - Highlighting that leaves markup alone
//! - Keyword frequency extraction

mod highlight;
mod keywords;
mod query;
mod scoring;
mod stopwords;

pub use highlight::{
    highlight_in_text_only, highlight_term, term_pattern, HIGHLIGHT_CLOSE, HIGHLIGHT_OPEN,
};
pub use keywords::{
    extract_default_keyword_counts, extract_keyword_counts, KeywordCount, DEFAULT_KEYWORD_LIMIT,
};
pub use query::{parse_query, ParsedQuery};
pub use scoring::{score_fields, score_parsed, FieldWeights, ScoreResult};
pub use stopwords::{
    filter_default_stop_words, filter_stop_words, is_significant, is_stop_word,
    DEFAULT_MIN_WORD_LENGTH, DEFAULT_STOP_WORDS,
};
