//! Row shape of the site-wide search table.

use crate::config::SearchConfig;
use crate::document::Document;
use crate::index::{ColumnDef, IndexDefinition, IndexRow, RowContext};
use crate::Result;

/// Columns scored against a query, in scoring order.
pub const SEARCH_FIELDS: [&str; 3] = ["title", "description", "body_text"];

/// Definition backing [`super::FullTextSearchIndex`].
///
/// Reads `title`, `description` (falling back to `summary`) and `body`
/// (reduced to plain text). A document is listable unless its `listable`
/// field says otherwise.
#[derive(Debug, Clone)]
pub struct SearchDefinition {
    name: String,
    table: String,
    templates: Vec<String>,
}

impl SearchDefinition {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            name: config.name.clone(),
            table: config.table.clone(),
            templates: config.templates.clone(),
        }
    }
}

impl IndexDefinition for SearchDefinition {
    fn name(&self) -> &str {
        &self.name
    }

    fn collection_name(&self) -> &str {
        &self.table
    }

    fn templates(&self) -> &[String] {
        &self.templates
    }

    fn columns(&self) -> Vec<ColumnDef> {
        vec![
            ColumnDef::new("title", "TEXT"),
            ColumnDef::new("description", "TEXT"),
            ColumnDef::new("body_text", "TEXT"),
            ColumnDef::new("template", "TEXT NOT NULL"),
            ColumnDef::new("listable", "INTEGER DEFAULT 1"),
        ]
    }

    fn indexes(&self) -> Vec<String> {
        vec![format!(
            "CREATE INDEX IF NOT EXISTS \"idx_{0}_template\" ON \"{0}\"(template)",
            self.table
        )]
    }

    fn row_for(&self, document: &Document, ctx: &RowContext) -> Result<IndexRow> {
        let description = document
            .text("description")
            .filter(|d| !d.trim().is_empty())
            .or_else(|| document.text("summary"));
        let body_text = document
            .text("body")
            .map(|body| ctx.plain_text(&body))
            .unwrap_or_default();

        Ok(IndexRow::new()
            .with("title", ctx.text(document, "title"))
            .with("description", description)
            .with("body_text", body_text)
            .with("template", document.template.as_str())
            .with("listable", document.flag("listable").unwrap_or(true)))
    }

    /// An empty template list makes every document searchable.
    fn applies_to(&self, template: &str) -> bool {
        self.templates.is_empty() || self.templates.iter().any(|t| t == template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexValue;
    use chrono::Utc;

    #[test]
    fn test_applies_to_all_when_unrestricted() {
        let open = SearchDefinition::new(&SearchConfig::default());
        assert!(open.applies_to("anything"));

        let config = SearchConfig {
            templates: vec!["article".into()],
            ..SearchConfig::default()
        };
        let restricted = SearchDefinition::new(&config);
        assert!(restricted.applies_to("article"));
        assert!(!restricted.applies_to("event"));
    }

    #[test]
    fn test_row_for() {
        let doc = Document::new("a1", "article")
            .with_field("title", "Garden bees")
            .with_field("summary", "Which bees visit")
            .with_field("body", "<p>Bumblebees &amp; <em>solitary</em> bees</p>");
        let row = SearchDefinition::new(&SearchConfig::default())
            .row_for(&doc, &RowContext::new(Utc::now()))
            .unwrap();

        assert_eq!(row.get_str("description"), Some("Which bees visit"));
        assert_eq!(row.get_str("body_text"), Some("Bumblebees & solitary bees"));
        assert_eq!(row.get_str("template"), Some("article"));
        assert_eq!(row.get("listable"), Some(&IndexValue::Integer(1)));
    }
}
