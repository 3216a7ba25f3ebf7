//! Source documents and the collaborator that supplies them.
//!
//! Documents come from outside the crate (a CMS page tree in practice). The
//! core only reads them: an id, a template tag and named JSON fields.

use crate::config::IndexConfig;
use crate::{Result, SiteIndexError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::info;

/// A read-only source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(alias = "id")]
    pub page_id: String,
    pub template: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(page_id: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            page_id: page_id.into(),
            template: template.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style field setter, mostly for tests and fixtures.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.page_id
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    /// Field as text. Numbers and booleans are formatted; lists are joined
    /// with ", ".
    pub fn text(&self, name: &str) -> Option<String> {
        match self.field(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Array(_) => Some(self.list(name).join(", ")),
            _ => None,
        }
    }

    /// Field as a list of non-blank strings.
    ///
    /// A JSON array yields its scalar items; a string is split on the list
    /// delimiter.
    pub fn list(&self, name: &str) -> Vec<String> {
        let items: Vec<String> = match self.field(name) {
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    Value::Bool(b) => Some(b.to_string()),
                    _ => None,
                })
                .collect(),
            Some(Value::String(s)) => s
                .split(IndexConfig::LIST_DELIMITER)
                .map(str::to_string)
                .collect(),
            Some(other) => vec![other.to_string()],
            None => Vec::new(),
        };

        items
            .into_iter()
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    }

    /// Field as a boolean: JSON booleans, non-zero numbers, and the strings
    /// `true`, `1`, `yes`, `on`.
    pub fn flag(&self, name: &str) -> Option<bool> {
        match self.field(name)? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => Some(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
            Value::String(s) => Some(matches!(
                s.trim().to_lowercase().as_str(),
                "true" | "1" | "yes" | "on"
            )),
            _ => None,
        }
    }
}

/// Supplier of documents for indexing.
pub trait DocumentSource: Send + Sync {
    /// Every document with the given template tag.
    fn documents_for_template(&self, template: &str) -> Result<Vec<Document>>;

    /// Every document regardless of template.
    fn all_documents(&self) -> Result<Vec<Document>>;
}

/// Document source backed by a vector, optionally loaded from a JSON file.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentSource {
    documents: Vec<Document>,
}

impl MemoryDocumentSource {
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    /// Load a JSON array of documents.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| SiteIndexError::io_with_path(e, path))?;
        let documents: Vec<Document> = serde_json::from_str(&content)?;
        info!(
            "Loaded {} documents from {}",
            documents.len(),
            path.display()
        );
        Ok(Self { documents })
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, page_id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.page_id == page_id)
    }
}

impl DocumentSource for MemoryDocumentSource {
    fn documents_for_template(&self, template: &str) -> Result<Vec<Document>> {
        Ok(self
            .documents
            .iter()
            .filter(|d| d.template == template)
            .cloned()
            .collect())
    }

    fn all_documents(&self) -> Result<Vec<Document>> {
        Ok(self.documents.clone())
    }
}
