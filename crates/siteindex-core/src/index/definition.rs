//! The contract each content index implements.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use super::value::{IndexRow, IndexValue};
use crate::document::Document;
use crate::{Result, SiteIndexError};

static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static WHITESPACE_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// One column of an index table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    /// SQL type and optional default, e.g. `INTEGER DEFAULT 0`.
    pub sql_type: String,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
        }
    }
}

/// Schema and row extraction for one content index.
///
/// The manager adds the `page_id` primary key itself; `columns` lists every
/// other column and `row_for` fills them. Columns the row leaves out are
/// stored as NULL.
pub trait IndexDefinition: Send + Sync {
    /// Unique index name.
    fn name(&self) -> &str;

    /// Backing table name.
    fn collection_name(&self) -> &str;

    /// Document templates this index covers.
    fn templates(&self) -> &[String];

    fn columns(&self) -> Vec<ColumnDef>;

    /// Supplementary DDL, typically `CREATE INDEX IF NOT EXISTS` statements.
    fn indexes(&self) -> Vec<String> {
        Vec::new()
    }

    /// Compute the row for one document.
    fn row_for(&self, document: &Document, ctx: &RowContext) -> Result<IndexRow>;

    fn applies_to(&self, template: &str) -> bool {
        self.templates().iter().any(|t| t == template)
    }
}

/// Helpers available to [`IndexDefinition::row_for`].
#[derive(Debug, Clone, Copy)]
pub struct RowContext {
    now: DateTime<Utc>,
}

impl RowContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    /// Time the current rebuild or upsert started.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Text field that must be present and non-blank.
    pub fn required_text(&self, document: &Document, field: &str) -> Result<String> {
        document
            .text(field)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SiteIndexError::RowComputation {
                page_id: document.page_id.clone(),
                message: format!("missing required field {}", field),
            })
    }

    pub fn text(&self, document: &Document, field: &str) -> IndexValue {
        document.text(field).into()
    }

    /// Delimited list column.
    pub fn list(&self, document: &Document, field: &str) -> IndexValue {
        IndexValue::list(document.list(field))
    }

    /// Boolean column stored as 0/1. Missing counts as false.
    pub fn flag(&self, document: &Document, field: &str) -> IndexValue {
        document.flag(field).unwrap_or(false).into()
    }

    /// Date column normalized to `YYYY-MM-DD`.
    ///
    /// Accepts plain dates, RFC 3339 timestamps and `YYYY-MM-DD HH:MM:SS`.
    /// A present but unparseable value is an error so the document is skipped
    /// rather than indexed with a wrong date.
    pub fn date(&self, document: &Document, field: &str) -> Result<IndexValue> {
        let Some(raw) = document.text(field) else {
            return Ok(IndexValue::Null);
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(IndexValue::Null);
        }

        parse_date(raw)
            .map(|date| IndexValue::Text(date.format("%Y-%m-%d").to_string()))
            .ok_or_else(|| SiteIndexError::RowComputation {
                page_id: document.page_id.clone(),
                message: format!("field {} has unparseable date {:?}", field, raw),
            })
    }

    /// Markup reduced to whitespace-normalized text.
    pub fn plain_text(&self, html: &str) -> String {
        plain_text(html)
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

/// Strip tags, decode the common entities and collapse whitespace.
pub fn plain_text(html: &str) -> String {
    let stripped = TAG_PATTERN.replace_all(html, " ");
    let decoded = stripped
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    WHITESPACE_PATTERN.replace_all(&decoded, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> RowContext {
        RowContext::new(Utc::now())
    }

    #[test]
    fn test_date_formats() {
        let doc = Document::new("p1", "event")
            .with_field("a", "2025-03-01")
            .with_field("b", "2025-03-01T18:30:00+01:00")
            .with_field("c", "2025-03-01 09:00:00")
            .with_field("d", "")
            .with_field("bad", "next tuesday");

        let ctx = ctx();
        for field in ["a", "b", "c"] {
            assert_eq!(
                ctx.date(&doc, field).unwrap(),
                IndexValue::Text("2025-03-01".into())
            );
        }
        assert_eq!(ctx.date(&doc, "d").unwrap(), IndexValue::Null);
        assert_eq!(ctx.date(&doc, "missing").unwrap(), IndexValue::Null);
        assert!(matches!(
            ctx.date(&doc, "bad"),
            Err(SiteIndexError::RowComputation { .. })
        ));
    }

    #[test]
    fn test_required_text() {
        let doc = Document::new("p1", "event")
            .with_field("title", "  Moth night ")
            .with_field("blank", "   ");
        let ctx = ctx();
        assert_eq!(ctx.required_text(&doc, "title").unwrap(), "Moth night");
        assert!(ctx.required_text(&doc, "blank").is_err());
        assert!(ctx.required_text(&doc, "missing").is_err());
    }

    #[test]
    fn test_list_and_flag() {
        let doc = Document::new("p1", "event")
            .with_field("categories", json!(["Botany", "Walks"]))
            .with_field("featured", true);
        let ctx = ctx();
        assert_eq!(
            ctx.list(&doc, "categories"),
            IndexValue::Text("Botany,Walks".into())
        );
        assert_eq!(ctx.flag(&doc, "featured"), IndexValue::Integer(1));
        assert_eq!(ctx.flag(&doc, "missing"), IndexValue::Integer(0));
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(
            plain_text("<p>Bees &amp; wasps</p>\n<p>in   the <b>garden</b></p>"),
            "Bees & wasps in the garden"
        );
    }
}
