//! Index definitions loaded from configuration.
//!
//! A [`MappedDefinition`] fills each column from one document field,
//! converted according to the column's [`ColumnKind`].

use serde::{Deserialize, Serialize};

use super::definition::{ColumnDef, IndexDefinition, RowContext};
use super::value::{IndexRow, IndexValue};
use crate::document::Document;
use crate::{Result, SiteIndexError};

/// How a document field becomes a column value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    #[default]
    Text,
    Integer,
    Real,
    Flag,
    Date,
    List,
    PlainText,
}

impl ColumnKind {
    fn default_sql_type(&self) -> &'static str {
        match self {
            ColumnKind::Integer => "INTEGER",
            ColumnKind::Real => "REAL",
            ColumnKind::Flag => "INTEGER DEFAULT 0",
            ColumnKind::List => "TEXT DEFAULT ''",
            ColumnKind::Text | ColumnKind::Date | ColumnKind::PlainText => "TEXT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedColumn {
    pub name: String,
    /// Document field to read. Defaults to the column name.
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub kind: ColumnKind,
    /// Explicit SQL type; otherwise derived from the kind.
    #[serde(default)]
    pub sql_type: Option<String>,
    /// A document without this field is skipped.
    #[serde(default)]
    pub required: bool,
}

impl MappedColumn {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            source: None,
            kind,
            sql_type: None,
            required: false,
        }
    }

    pub fn from_field(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn source(&self) -> &str {
        self.source.as_deref().unwrap_or(&self.name)
    }

    pub fn sql_type(&self) -> &str {
        self.sql_type
            .as_deref()
            .unwrap_or_else(|| self.kind.default_sql_type())
    }

    fn value(&self, document: &Document, ctx: &RowContext) -> Result<IndexValue> {
        let field = self.source();
        if self.required && document.text(field).is_none_or(|t| t.trim().is_empty()) {
            return Err(SiteIndexError::RowComputation {
                page_id: document.page_id.clone(),
                message: format!("missing required field {}", field),
            });
        }

        let value = match self.kind {
            ColumnKind::Text => ctx.text(document, field),
            ColumnKind::PlainText => document.text(field).map(|t| ctx.plain_text(&t)).into(),
            ColumnKind::List => ctx.list(document, field),
            ColumnKind::Flag => ctx.flag(document, field),
            ColumnKind::Date => ctx.date(document, field)?,
            ColumnKind::Integer => match document.text(field) {
                None => IndexValue::Null,
                Some(raw) => raw
                    .trim()
                    .parse::<i64>()
                    .map(IndexValue::Integer)
                    .map_err(|_| self.parse_error(document, &raw))?,
            },
            ColumnKind::Real => match document.text(field) {
                None => IndexValue::Null,
                Some(raw) => raw
                    .trim()
                    .parse::<f64>()
                    .map(IndexValue::Real)
                    .map_err(|_| self.parse_error(document, &raw))?,
            },
        };
        Ok(value)
    }

    fn parse_error(&self, document: &Document, raw: &str) -> SiteIndexError {
        SiteIndexError::RowComputation {
            page_id: document.page_id.clone(),
            message: format!("field {} is not a valid {:?}: {:?}", self.source(), self.kind, raw),
        }
    }
}

/// Configuration-driven index definition.
///
/// ```json
/// {
///   "name": "events",
///   "collection": "events_index",
///   "templates": ["event"],
///   "columns": [
///     { "name": "title", "kind": "text", "required": true },
///     { "name": "start_date", "kind": "date" },
///     { "name": "categories", "kind": "list" }
///   ],
///   "indexes": ["CREATE INDEX IF NOT EXISTS idx_events_start ON events_index(start_date)"]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedDefinition {
    pub name: String,
    pub collection: String,
    pub templates: Vec<String>,
    pub columns: Vec<MappedColumn>,
    #[serde(default)]
    pub indexes: Vec<String>,
}

impl MappedDefinition {
    pub fn new(
        name: impl Into<String>,
        collection: impl Into<String>,
        templates: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            collection: collection.into(),
            templates,
            columns: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn with_column(mut self, column: MappedColumn) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_index(mut self, ddl: impl Into<String>) -> Self {
        self.indexes.push(ddl.into());
        self
    }
}

impl IndexDefinition for MappedDefinition {
    fn name(&self) -> &str {
        &self.name
    }

    fn collection_name(&self) -> &str {
        &self.collection
    }

    fn templates(&self) -> &[String] {
        &self.templates
    }

    fn columns(&self) -> Vec<ColumnDef> {
        self.columns
            .iter()
            .map(|c| ColumnDef::new(&c.name, c.sql_type()))
            .collect()
    }

    fn indexes(&self) -> Vec<String> {
        self.indexes.clone()
    }

    fn row_for(&self, document: &Document, ctx: &RowContext) -> Result<IndexRow> {
        let mut row = IndexRow::new();
        for column in &self.columns {
            row.set(column.name.clone(), column.value(document, ctx)?);
        }
        Ok(row)
    }
}
