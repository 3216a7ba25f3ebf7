//! Centralized configuration for siteindex.
//!
//! Constant structs hold fixed parameters of the indexing and scoring
//! pipeline. [`SiteIndexConfig`] is the file-backed configuration an
//! application loads once at start-up: the index definitions to register and
//! the search index settings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::index::MappedDefinition;
use crate::{Result, SiteIndexError};

/// Storage-level configuration.
pub struct IndexConfig;

impl IndexConfig {
    /// Primary key column present in every index table.
    pub const PRIMARY_KEY: &'static str = "page_id";
    /// Table holding per-index rebuild metadata.
    pub const META_TABLE: &'static str = "siteindex_meta";
    /// Table holding the search query log.
    pub const SEARCH_LOG_TABLE: &'static str = "siteindex_search_log";
    /// Delimiter for multi-valued columns.
    pub const LIST_DELIMITER: char = ',';
    pub const BUSY_TIMEOUT_MS: u64 = 30_000;
}

/// Relevance scoring constants.
pub struct ScoringConfig;

impl ScoringConfig {
    /// Score per phrase occurrence, before field weight.
    pub const PHRASE_MULTIPLIER: i64 = 10;
    /// Multiplier when every query word appears in a single field.
    pub const ALL_TERMS_BONUS: i64 = 5;
    pub const DEFAULT_FIELD_WEIGHT: i64 = 1;
}

/// Settings for the full-text search index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Index name reported in stats.
    pub name: String,
    /// Backing table.
    pub table: String,
    /// Templates whose documents are searchable. Empty means every template.
    pub templates: Vec<String>,
    /// Field weights used for ranking.
    pub weights: BTreeMap<String, i64>,
    /// Page size when a request does not give one.
    pub default_limit: usize,
    /// Upper bound on the page size a request may ask for.
    pub max_limit: usize,
}

impl SearchConfig {
    pub const DEFAULT_NAME: &'static str = "search";
    pub const DEFAULT_TABLE: &'static str = "search_index";
    pub const DEFAULT_LIMIT: usize = 20;
    pub const MAX_LIMIT: usize = 200;
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            name: SearchConfig::DEFAULT_NAME.to_string(),
            table: SearchConfig::DEFAULT_TABLE.to_string(),
            templates: Vec::new(),
            weights: BTreeMap::from([
                ("title".to_string(), 10),
                ("description".to_string(), 5),
                ("body_text".to_string(), 1),
            ]),
            default_limit: SearchConfig::DEFAULT_LIMIT,
            max_limit: SearchConfig::MAX_LIMIT,
        }
    }
}

/// Application configuration file.
///
/// ```json
/// {
///   "indexes": [{ "name": "events", "collection": "events_index", ... }],
///   "search": { "templates": ["article", "event"] }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteIndexConfig {
    pub indexes: Vec<MappedDefinition>,
    pub search: SearchConfig,
}

impl SiteIndexConfig {
    /// Load configuration from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| SiteIndexError::io_with_path(e, path))?;
        Self::from_json(&content)
    }

    /// Parse configuration from JSON text.
    pub fn from_json(content: &str) -> Result<Self> {
        let config: SiteIndexConfig =
            serde_json::from_str(content).map_err(|e| SiteIndexError::Config {
                message: format!("Invalid configuration: {}", e),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject limits, duplicate index names and shared or reserved tables.
    pub fn validate(&self) -> Result<()> {
        if self.search.default_limit == 0 || self.search.default_limit > self.search.max_limit {
            return Err(SiteIndexError::Config {
                message: format!(
                    "search.default_limit must be between 1 and {}",
                    self.search.max_limit
                ),
            });
        }

        let mut seen = std::collections::HashSet::new();
        seen.insert(self.search.name.as_str());
        for index in &self.indexes {
            if !seen.insert(index.name.as_str()) {
                return Err(SiteIndexError::Config {
                    message: format!("Duplicate index name: {}", index.name),
                });
            }
        }

        let reserved = [
            IndexConfig::META_TABLE.to_ascii_lowercase(),
            IndexConfig::SEARCH_LOG_TABLE.to_ascii_lowercase(),
            self.search.table.to_ascii_lowercase(),
        ];
        let mut tables = std::collections::HashSet::new();
        for index in &self.indexes {
            let table = index.collection.to_ascii_lowercase();
            if reserved.contains(&table) {
                return Err(SiteIndexError::Config {
                    message: format!(
                        "Index {} cannot use reserved table {}",
                        index.name, index.collection
                    ),
                });
            }
            if !tables.insert(table) {
                return Err(SiteIndexError::Config {
                    message: format!(
                        "Index {} shares table {} with another index",
                        index.name, index.collection
                    ),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_search_weights() {
        let config = SearchConfig::default();
        assert_eq!(config.weights.get("title"), Some(&10));
        assert_eq!(config.table, "search_index");
        assert!(config.default_limit <= config.max_limit);
    }

    #[test]
    fn test_empty_config_parses() {
        let config = SiteIndexConfig::from_json("{}").unwrap();
        assert!(config.indexes.is_empty());
        assert_eq!(config.search.name, "search");
    }

    #[test]
    fn test_rejects_zero_limit() {
        let err = SiteIndexConfig::from_json(r#"{"search": {"default_limit": 0}}"#).unwrap_err();
        assert!(matches!(err, SiteIndexError::Config { .. }));
    }

    #[test]
    fn test_rejects_index_named_like_search() {
        let err = SiteIndexConfig::from_json(
            r#"{"indexes": [{"name": "search", "collection": "s", "templates": [], "columns": []}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SiteIndexError::Config { .. }));
    }

    #[test]
    fn test_rejects_shared_collection() {
        let err = SiteIndexConfig::from_json(
            r#"{"indexes": [
                {"name": "events", "collection": "pages_index", "templates": [], "columns": []},
                {"name": "talks", "collection": "pages_index", "templates": [], "columns": []}
            ]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SiteIndexError::Config { .. }));
    }

    #[test]
    fn test_rejects_reserved_collection() {
        for table in ["siteindex_meta", "siteindex_search_log", "pages_fts"] {
            let json = format!(
                r#"{{"search": {{"table": "pages_fts"}},
                    "indexes": [{{"name": "events", "collection": "{}", "templates": [], "columns": []}}]}}"#,
                table
            );
            let err = SiteIndexConfig::from_json(&json).unwrap_err();
            assert!(matches!(err, SiteIndexError::Config { .. }), "{} was accepted", table);
        }
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(SiteIndexConfig::from_json("{ not json").is_err());
    }
}
