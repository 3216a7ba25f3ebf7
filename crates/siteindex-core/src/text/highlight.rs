//! Markup-aware term highlighting.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;
use tracing::warn;

use super::query::parse_query;

/// A markup tag with its attributes, or a character reference like `&amp;`.
static MARKUP_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>|&[#\w]+;").unwrap());

/// Opening marker wrapped around each match.
pub const HIGHLIGHT_OPEN: &str = r#"<span class="highlight">"#;
/// Closing marker wrapped around each match.
pub const HIGHLIGHT_CLOSE: &str = "</span>";

/// Wrap matches of `pattern` in a highlight span, touching text nodes only.
///
/// `pattern` must have one capture group; the captured text is what gets
/// wrapped. Tag names, attribute values and character references are copied
/// through unchanged, so a term that appears in an `href` or inside `&amp;` is
/// not rewritten.
pub fn highlight_in_text_only(html: &str, pattern: &Regex) -> String {
    let mut out = String::with_capacity(html.len());
    let mut last = 0;

    for tag in MARKUP_PATTERN.find_iter(html) {
        out.push_str(&highlight_segment(&html[last..tag.start()], pattern));
        out.push_str(tag.as_str());
        last = tag.end();
    }
    out.push_str(&highlight_segment(&html[last..], pattern));

    out
}

fn highlight_segment<'t>(text: &'t str, pattern: &Regex) -> Cow<'t, str> {
    if text.is_empty() {
        return Cow::Borrowed(text);
    }
    let replacement = format!("{}${{1}}{}", HIGHLIGHT_OPEN, HIGHLIGHT_CLOSE);
    pattern.replace_all(text, replacement.as_str())
}

/// Build the case-insensitive alternation used by [`highlight_term`].
///
/// Returns `None` when the term has nothing to highlight. Longer units come
/// first so a phrase wins over a word it contains.
pub fn term_pattern(term: &str) -> Option<Regex> {
    let parsed = parse_query(term);
    let mut units: Vec<&str> = parsed.terms().collect();
    if units.is_empty() {
        return None;
    }

    units.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
    units.dedup();

    let alternation = units
        .iter()
        .map(|unit| regex::escape(unit))
        .collect::<Vec<_>>()
        .join("|");

    match Regex::new(&format!("(?i)({})", alternation)) {
        Ok(pattern) => Some(pattern),
        Err(e) => {
            warn!("Failed to build highlight pattern for {:?}: {}", term, e);
            None
        }
    }
}

/// Highlight the phrases and words of a search term inside markup.
///
/// Stop words and short words in `term` are not highlighted. If the term has
/// no matchable units the markup is returned unchanged.
pub fn highlight_term(html: &str, term: &str) -> String {
    match term_pattern(term) {
        Some(pattern) => highlight_in_text_only(html, &pattern),
        None => html.to_string(),
    }
}
