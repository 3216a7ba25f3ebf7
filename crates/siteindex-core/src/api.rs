//! Top-level handle tying the registry and the search index to one database.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::SiteIndexConfig;
use crate::db::Database;
use crate::document::{Document, DocumentSource};
use crate::index::{IndexDefinition, IndexRegistry, IndexStats, RebuildReport, UpsertOutcome};
use crate::search::FullTextSearchIndex;
use crate::Result;

/// Outcome of rebuilding everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildAllReport {
    pub reports: Vec<RebuildReport>,
    /// Index name and error message for every index that failed.
    pub failures: Vec<(String, String)>,
}

/// Content indexes plus the site-wide search index.
///
/// ```rust,ignore
/// use siteindex::{MemoryDocumentSource, SiteIndex, SiteIndexConfig};
///
/// let config = SiteIndexConfig::from_path("siteindex.json".as_ref())?;
/// let site = SiteIndex::open("data/index.db", config)?;
/// let source = MemoryDocumentSource::from_path("documents.json".as_ref())?;
/// site.rebuild_all(&source);
///
/// let results = site.search().search("moth night", &Default::default())?;
/// ```
pub struct SiteIndex {
    db: Database,
    registry: IndexRegistry,
    search: FullTextSearchIndex,
}

impl SiteIndex {
    /// Open a database file and register every configured index.
    ///
    /// An index whose schema cannot be created is logged and left out; a
    /// failing search index is an error.
    pub fn open(db_path: impl AsRef<Path>, config: SiteIndexConfig) -> Result<Self> {
        let db = Database::open(db_path.as_ref())?;
        Self::with_database(db, config)
    }

    pub fn in_memory(config: SiteIndexConfig) -> Result<Self> {
        Self::with_database(Database::open_in_memory()?, config)
    }

    pub fn with_database(db: Database, config: SiteIndexConfig) -> Result<Self> {
        config.validate()?;

        let search = FullTextSearchIndex::new(db.clone(), config.search)?;
        let mut registry = IndexRegistry::new(db.clone());
        registry.reserve_table(search.config().table.clone());
        let definitions = config
            .indexes
            .into_iter()
            .map(|d| Arc::new(d) as Arc<dyn IndexDefinition>);
        let failures = registry.register_all(definitions);

        info!(
            "Site index ready: {} indexes, {} failed to register",
            registry.len(),
            failures.len()
        );
        Ok(Self {
            db,
            registry,
            search,
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn registry(&self) -> &IndexRegistry {
        &self.registry
    }

    /// Mutable access for registering code-defined indexes.
    pub fn registry_mut(&mut self) -> &mut IndexRegistry {
        &mut self.registry
    }

    pub fn search(&self) -> &FullTextSearchIndex {
        &self.search
    }

    /// Rebuild one registered index.
    pub fn rebuild_index(&self, name: &str, source: &dyn DocumentSource) -> Result<RebuildReport> {
        if name == self.search.config().name {
            return self.search.rebuild_from_source(source);
        }
        self.registry.require(name)?.rebuild_from_source(source)
    }

    /// Rebuild every registered index and then the search index.
    pub fn rebuild_all(&self, source: &dyn DocumentSource) -> RebuildAllReport {
        let mut report = RebuildAllReport::default();
        let search_name = self.search.config().name.clone();

        let results = self
            .registry
            .rebuild_all(source)
            .into_iter()
            .chain(std::iter::once((
                search_name,
                self.search.rebuild_from_source(source),
            )));

        for (name, result) in results {
            match result {
                Ok(r) => report.reports.push(r),
                Err(e) => {
                    error!("Rebuild of {} failed: {}", name, e);
                    report.failures.push((name, e.user_message()));
                }
            }
        }
        report
    }

    /// Push one changed document to the search index and every matching
    /// content index.
    pub fn upsert_document(&self, document: &Document) -> Vec<(String, Result<UpsertOutcome>)> {
        let mut outcomes = self.registry.upsert_document(document);
        outcomes.push((self.search.config().name.clone(), self.search.upsert(document)));
        outcomes
    }

    /// Remove a deleted document everywhere it is indexed.
    pub fn remove_document(&self, document: &Document) -> Result<usize> {
        let mut removed = self.registry.remove_document(document)?;
        if self.search.remove(&document.page_id)? {
            removed += 1;
        }
        Ok(removed)
    }

    /// Stats for one index, the search index included.
    pub fn get_stats(&self, name: &str) -> Result<IndexStats> {
        if name == self.search.config().name {
            return self.search.get_stats();
        }
        self.registry.require(name)?.get_stats()
    }

    /// Stats for every index in registration order, search last.
    pub fn all_stats(&self) -> Result<Vec<IndexStats>> {
        let mut stats = self
            .registry
            .all()
            .iter()
            .map(|m| m.get_stats())
            .collect::<Result<Vec<_>>>()?;
        stats.push(self.search.get_stats()?);
        Ok(stats)
    }

    /// Names of every index, search last.
    pub fn index_names(&self) -> Vec<String> {
        let mut names = self.registry.names();
        names.push(self.search.config().name.clone());
        names
    }
}

impl std::fmt::Debug for SiteIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteIndex")
            .field("registry", &self.registry)
            .field("search", &self.search)
            .finish()
    }
}
