//! Site-wide full-text search.
//!
//! [`FullTextSearchIndex`] keeps one row per searchable document and ranks
//! candidates in process with the weighted scorer from [`crate::text`].
//! Queries can be logged so that popular keywords can be reported.

mod definition;
mod log;

pub use definition::{SearchDefinition, SEARCH_FIELDS};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::SearchConfig;
use crate::db::Database;
use crate::document::{Document, DocumentSource};
use crate::index::{IndexManager, IndexStats, RebuildReport, UpsertOutcome};
use crate::text::{highlight_term, parse_query, score_parsed, FieldWeights, KeywordCount};
use crate::{Result, SiteIndexError};

/// Paging and filtering for one search request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchOptions {
    /// Page size. `None` uses the configured default; larger values are
    /// capped at the configured maximum.
    pub limit: Option<usize>,
    pub offset: usize,
    /// Only documents that may appear in listings.
    pub listable_only: bool,
    /// Restrict to these templates. Empty means no restriction.
    pub templates: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub page_id: String,
    pub template: String,
    pub title: Option<String>,
    pub score: i64,
    /// Occurrences of the query's phrases and words.
    pub hits: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub query: String,
    /// Matching documents before paging.
    pub total: usize,
    pub hits: Vec<SearchHit>,
    pub query_time_ms: u64,
}

impl SearchResults {
    fn empty(query: &str, started: Instant) -> Self {
        Self {
            query: query.to_string(),
            total: 0,
            hits: Vec::new(),
            query_time_ms: started.elapsed().as_millis() as u64,
        }
    }
}

/// The site-wide search index.
pub struct FullTextSearchIndex {
    manager: Arc<IndexManager>,
    config: SearchConfig,
    weights: FieldWeights,
}

impl FullTextSearchIndex {
    /// Create the search and query-log tables if needed.
    pub fn new(db: Database, config: SearchConfig) -> Result<Self> {
        let manager = Arc::new(IndexManager::new(
            Arc::new(SearchDefinition::new(&config)),
            db.clone(),
        ));
        manager.ensure_schema()?;

        {
            let conn = db.lock_conn()?;
            log::ensure_log_table(&conn).map_err(|e| SiteIndexError::Schema {
                index: config.name.clone(),
                message: format!("search log table: {}", e),
                source: Some(e),
            })?;
        }

        let weights = config
            .weights
            .iter()
            .map(|(field, weight)| (field.clone(), *weight))
            .collect();

        Ok(Self {
            manager,
            config,
            weights,
        })
    }

    pub fn manager(&self) -> &Arc<IndexManager> {
        &self.manager
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn rebuild<'d, I>(&self, documents: I) -> Result<RebuildReport>
    where
        I: IntoIterator<Item = &'d Document>,
    {
        self.manager.rebuild(documents)
    }

    pub fn rebuild_from_source(&self, source: &dyn DocumentSource) -> Result<RebuildReport> {
        self.manager.rebuild_from_source(source)
    }

    pub fn upsert(&self, document: &Document) -> Result<UpsertOutcome> {
        self.manager.upsert_row(document)
    }

    pub fn remove(&self, page_id: &str) -> Result<bool> {
        self.manager.remove_row(page_id)
    }

    pub fn get_stats(&self) -> Result<IndexStats> {
        self.manager.get_stats()
    }

    fn page_size(&self, requested: Option<usize>) -> Result<usize> {
        match requested {
            None => Ok(self.config.default_limit),
            Some(0) => Err(SiteIndexError::invalid_argument(
                "limit must be greater than zero",
            )),
            Some(limit) => Ok(limit.min(self.config.max_limit)),
        }
    }

    /// Rank searchable documents against `query`.
    ///
    /// Documents scoring zero are dropped. Ties keep table order.
    pub fn search(&self, query: &str, options: &SearchOptions) -> Result<SearchResults> {
        let started = Instant::now();
        let limit = self.page_size(options.limit)?;

        let parsed = parse_query(query);
        if parsed.is_empty() {
            debug!("Search query {:?} has no matchable terms", query);
            return Ok(SearchResults::empty(query, started));
        }

        let mut candidates = self.manager.query();
        if options.listable_only {
            candidates = candidates.where_true("listable");
        }
        if let [template] = options.templates.as_slice() {
            candidates = candidates.where_eq("template", template.as_str());
        }

        let mut scored = Vec::new();
        for row in candidates.get()? {
            let template = row.get_str("template").unwrap_or_default().to_string();
            if options.templates.len() > 1 && !options.templates.contains(&template) {
                continue;
            }

            let texts: Vec<String> = SEARCH_FIELDS
                .iter()
                .map(|field| row.get(field).map(|v| v.to_text()).unwrap_or_default())
                .collect();
            let fields: Vec<(&str, &str)> = SEARCH_FIELDS
                .iter()
                .copied()
                .zip(texts.iter().map(String::as_str))
                .collect();

            let result = score_parsed(&fields, &parsed, &self.weights);
            if !result.is_match() {
                continue;
            }

            scored.push(SearchHit {
                page_id: row.page_id().unwrap_or_default().to_string(),
                template,
                title: row.get_str("title").map(str::to_string),
                score: result.score,
                hits: result.hits,
            });
        }

        scored.sort_by(|a, b| b.score.cmp(&a.score));
        let total = scored.len();
        let hits: Vec<SearchHit> = scored
            .into_iter()
            .skip(options.offset)
            .take(limit)
            .collect();

        let query_time_ms = started.elapsed().as_millis() as u64;
        info!(
            "Search {:?}: {} matches, {} returned in {}ms",
            query,
            total,
            hits.len(),
            query_time_ms
        );

        Ok(SearchResults {
            query: query.to_string(),
            total,
            hits,
            query_time_ms,
        })
    }

    /// Highlight the query's terms inside a fragment of markup.
    pub fn highlight(&self, html: &str, query: &str) -> String {
        highlight_term(html, query)
    }

    /// Log a query. Returns false when the query was blank.
    pub fn record_query(&self, query: &str, result_count: usize) -> Result<bool> {
        let conn = self.manager_db()?;
        log::record(&conn, query, result_count)
    }

    /// Most frequent significant keywords across logged queries.
    pub fn popular_keywords(&self, limit: usize) -> Result<Vec<KeywordCount>> {
        let conn = self.manager_db()?;
        log::popular_keywords(&conn, limit)
    }

    fn manager_db(&self) -> Result<std::sync::MutexGuard<'_, rusqlite::Connection>> {
        self.manager.database().lock_conn()
    }
}

impl std::fmt::Debug for FullTextSearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FullTextSearchIndex")
            .field("name", &self.config.name)
            .field("table", &self.config.table)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> FullTextSearchIndex {
        let index =
            FullTextSearchIndex::new(Database::open_in_memory().unwrap(), SearchConfig::default())
                .unwrap();
        let docs = vec![
            Document::new("p1", "article")
                .with_field("title", "Garden moths")
                .with_field("body", "<p>Moths visit the garden at night.</p>"),
            Document::new("p2", "article")
                .with_field("title", "Bees")
                .with_field("description", "A note on moths"),
            Document::new("p3", "event")
                .with_field("title", "Moth night")
                .with_field("listable", false),
            Document::new("p4", "article").with_field("title", "Lichens"),
        ];
        index.rebuild(&docs).unwrap();
        index
    }

    #[test]
    fn test_ranking_and_zero_scores_dropped() {
        let results = index().search("moth", &SearchOptions::default()).unwrap();
        let ids: Vec<&str> = results.hits.iter().map(|h| h.page_id.as_str()).collect();
        assert_eq!(results.total, 3);
        // title matches outrank a description match
        assert_eq!(ids[2], "p2");
        assert!(!ids.contains(&"p4"));
        assert!(results.hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_empty_query() {
        let results = index().search("the of", &SearchOptions::default()).unwrap();
        assert_eq!(results.total, 0);
        assert!(results.hits.is_empty());
    }

    #[test]
    fn test_filters_and_paging() {
        let index = index();
        let listable = index
            .search(
                "moth",
                &SearchOptions {
                    listable_only: true,
                    ..SearchOptions::default()
                },
            )
            .unwrap();
        assert_eq!(listable.total, 2);

        let events = index
            .search(
                "moth",
                &SearchOptions {
                    templates: vec!["event".into()],
                    ..SearchOptions::default()
                },
            )
            .unwrap();
        assert_eq!(events.total, 1);
        assert_eq!(events.hits[0].page_id, "p3");

        let page = index
            .search(
                "moth",
                &SearchOptions {
                    limit: Some(1),
                    offset: 1,
                    ..SearchOptions::default()
                },
            )
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.hits.len(), 1);

        let zero = index.search(
            "moth",
            &SearchOptions {
                limit: Some(0),
                ..SearchOptions::default()
            },
        );
        assert!(matches!(zero, Err(SiteIndexError::InvalidArgument { .. })));
    }

    #[test]
    fn test_query_log() {
        let index = index();
        index.record_query("garden moths", 2).unwrap();
        index.record_query("moths at night", 1).unwrap();
        let popular = index.popular_keywords(5).unwrap();
        assert_eq!(popular[0].keyword, "moths");
        assert_eq!(popular[0].count, 2);
    }
}
