//! Name-keyed collection of index managers sharing one database.

use std::sync::Arc;
use tracing::{error, info, warn};

use super::definition::IndexDefinition;
use super::manager::{IndexManager, RebuildReport, UpsertOutcome};
use crate::config::IndexConfig;
use crate::db::Database;
use crate::document::{Document, DocumentSource};
use crate::{Result, SiteIndexError};

/// Registered index managers, in registration order.
pub struct IndexRegistry {
    db: Database,
    managers: Vec<Arc<IndexManager>>,
    /// Tables owned by something other than a content index.
    reserved_tables: Vec<String>,
}

impl IndexRegistry {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            managers: Vec::new(),
            reserved_tables: vec![
                IndexConfig::META_TABLE.to_string(),
                IndexConfig::SEARCH_LOG_TABLE.to_string(),
            ],
        }
    }

    /// Keep definitions from claiming a table used elsewhere, such as the
    /// search index.
    pub fn reserve_table(&mut self, table: impl Into<String>) {
        self.reserved_tables.push(table.into());
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Register a definition and make sure its table exists.
    ///
    /// Registering a name that is already present replaces the earlier
    /// manager but keeps its position. A table may belong to one index name
    /// only, and reserved tables cannot be claimed at all.
    pub fn register(&mut self, definition: Arc<dyn IndexDefinition>) -> Result<Arc<IndexManager>> {
        let name = definition.name();
        if name.trim().is_empty() {
            return Err(SiteIndexError::invalid_argument(
                "index definition name must not be empty",
            ));
        }
        if name != name.trim() {
            return Err(SiteIndexError::invalid_argument(format!(
                "index definition name {:?} has surrounding whitespace",
                name
            )));
        }
        let name = name.to_string();
        let table = definition.collection_name();

        if self
            .reserved_tables
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(table))
        {
            return Err(SiteIndexError::invalid_argument(format!(
                "index {} cannot use reserved table {}",
                name, table
            )));
        }
        if let Some(owner) = self
            .managers
            .iter()
            .find(|m| m.name() != name && m.table().eq_ignore_ascii_case(table))
        {
            return Err(SiteIndexError::invalid_argument(format!(
                "index {} cannot use table {}, already owned by index {}",
                name,
                table,
                owner.name()
            )));
        }

        let manager = Arc::new(IndexManager::new(definition, self.db.clone()));
        manager.ensure_schema()?;

        match self.managers.iter_mut().find(|m| m.name() == name) {
            Some(slot) => {
                warn!("Replacing registered index {}", name);
                *slot = Arc::clone(&manager);
            }
            None => {
                info!("Registered index {} ({})", name, manager.table());
                self.managers.push(Arc::clone(&manager));
            }
        }
        Ok(manager)
    }

    /// Register every definition, returning the failures instead of stopping
    /// at the first one.
    pub fn register_all<I>(&mut self, definitions: I) -> Vec<SiteIndexError>
    where
        I: IntoIterator<Item = Arc<dyn IndexDefinition>>,
    {
        let mut failures = Vec::new();
        for definition in definitions {
            let name = definition.name().to_string();
            if let Err(e) = self.register(definition) {
                error!("Failed to register index {}: {}", name, e);
                failures.push(e);
            }
        }
        failures
    }

    pub fn get(&self, name: &str) -> Option<Arc<IndexManager>> {
        self.managers.iter().find(|m| m.name() == name).cloned()
    }

    /// Like [`Self::get`] but a missing index is an error.
    pub fn require(&self, name: &str) -> Result<Arc<IndexManager>> {
        self.get(name).ok_or_else(|| SiteIndexError::NotFound {
            what: format!("index {}", name),
        })
    }

    pub fn all(&self) -> &[Arc<IndexManager>] {
        &self.managers
    }

    pub fn names(&self) -> Vec<String> {
        self.managers.iter().map(|m| m.name().to_string()).collect()
    }

    /// Managers whose definition covers `template`.
    pub fn managers_for_template(&self, template: &str) -> Vec<Arc<IndexManager>> {
        self.managers
            .iter()
            .filter(|m| m.definition().applies_to(template))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }

    /// Forget every manager. Tables are left in place.
    pub fn clear(&mut self) {
        self.managers.clear();
    }

    /// Rebuild every index from `source`.
    ///
    /// Each entry pairs an index name with its outcome; one failing index
    /// does not stop the others.
    pub fn rebuild_all(&self, source: &dyn DocumentSource) -> Vec<(String, Result<RebuildReport>)> {
        self.managers
            .iter()
            .map(|manager| {
                let result = manager.rebuild_from_source(source);
                if let Err(e) = &result {
                    error!("Rebuild of index {} failed: {}", manager.name(), e);
                }
                (manager.name().to_string(), result)
            })
            .collect()
    }

    /// Push a changed document to every index covering its template.
    pub fn upsert_document(&self, document: &Document) -> Vec<(String, Result<UpsertOutcome>)> {
        self.managers_for_template(&document.template)
            .iter()
            .map(|manager| (manager.name().to_string(), manager.upsert_row(document)))
            .collect()
    }

    /// Remove a deleted document from every index covering its template.
    pub fn remove_document(&self, document: &Document) -> Result<usize> {
        let mut removed = 0;
        for manager in self.managers_for_template(&document.template) {
            if manager.remove_row(&document.page_id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl std::fmt::Debug for IndexRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexRegistry")
            .field("indexes", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MemoryDocumentSource;
    use crate::index::mapped::{ColumnKind, MappedColumn, MappedDefinition};

    fn definition(name: &str, table: &str, templates: &[&str]) -> Arc<dyn IndexDefinition> {
        Arc::new(
            MappedDefinition::new(name, table, templates.iter().map(|t| t.to_string()).collect())
                .with_column(MappedColumn::new("title", ColumnKind::Text).required()),
        )
    }

    fn registry() -> IndexRegistry {
        IndexRegistry::new(Database::open_in_memory().unwrap())
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = registry();
        registry
            .register(definition("events", "events_index", &["event"]))
            .unwrap();
        registry
            .register(definition("articles", "articles_index", &["article", "event"]))
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["events", "articles"]);
        assert!(registry.get("events").is_some());
        assert!(registry.get("missing").is_none());
        assert!(matches!(
            registry.require("missing"),
            Err(SiteIndexError::NotFound { .. })
        ));
        assert!(registry.database().table_exists("articles_index").unwrap());

        let names: Vec<String> = registry
            .managers_for_template("event")
            .iter()
            .map(|m| m.name().to_string())
            .collect();
        assert_eq!(names, vec!["events", "articles"]);
        assert!(registry.managers_for_template("news").is_empty());
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut registry = registry();
        let err = registry
            .register(definition("  ", "blank_index", &["page"]))
            .unwrap_err();
        assert!(matches!(err, SiteIndexError::InvalidArgument { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_name_with_surrounding_whitespace_rejected() {
        let mut registry = registry();
        registry
            .register(definition("events", "events_index", &["event"]))
            .unwrap();
        let err = registry
            .register(definition(" events", "events2_index", &["event"]))
            .unwrap_err();
        assert!(matches!(err, SiteIndexError::InvalidArgument { .. }));
        assert_eq!(registry.names(), vec!["events"]);
        assert_eq!(registry.get("events").unwrap().table(), "events_index");
    }

    #[test]
    fn test_table_owned_by_another_index_rejected() {
        let mut registry = registry();
        let events = registry
            .register(definition("events", "events_index", &["event"]))
            .unwrap();
        let source = MemoryDocumentSource::new(vec![
            Document::new("e1", "event").with_field("title", "Moth night"),
        ]);
        events.rebuild_from_source(&source).unwrap();

        let err = registry
            .register(definition("talks", "Events_Index", &["talk"]))
            .unwrap_err();
        assert!(matches!(err, SiteIndexError::InvalidArgument { .. }));
        assert_eq!(registry.names(), vec!["events"]);

        // Rebuilding what is registered leaves the existing rows alone
        for (_, result) in registry.rebuild_all(&source) {
            result.unwrap();
        }
        assert_eq!(events.query().get_page_ids().unwrap(), vec!["e1"]);

        // Re-registering the owner on its own table is still allowed
        registry
            .register(definition("events", "events_index", &["event"]))
            .unwrap();
    }

    #[test]
    fn test_reserved_tables_rejected() {
        let mut registry = registry();
        registry.reserve_table("search_index");
        for table in [
            IndexConfig::META_TABLE,
            IndexConfig::SEARCH_LOG_TABLE,
            "search_index",
        ] {
            let err = registry
                .register(definition("sneaky", table, &["page"]))
                .unwrap_err();
            assert!(
                matches!(err, SiteIndexError::InvalidArgument { .. }),
                "{} was accepted",
                table
            );
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_last_registration_wins_in_place() {
        let mut registry = registry();
        registry.register(definition("a", "a_index", &["page"])).unwrap();
        registry.register(definition("b", "b_index", &["page"])).unwrap();
        registry.register(definition("a", "a2_index", &["page"])).unwrap();

        assert_eq!(registry.names(), vec!["a", "b"]);
        assert_eq!(registry.get("a").unwrap().table(), "a2_index");
    }

    #[test]
    fn test_register_all_collects_failures() {
        let mut registry = registry();
        let failures = registry.register_all(vec![
            definition("events", "events_index", &["event"]),
            definition("broken", "bad table", &["event"]),
            definition("articles", "articles_index", &["article"]),
        ]);

        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0], SiteIndexError::Schema { .. }));
        assert_eq!(registry.names(), vec!["events", "articles"]);
    }

    #[test]
    fn test_upsert_and_remove_document_routing() {
        let mut registry = registry();
        registry
            .register(definition("events", "events_index", &["event"]))
            .unwrap();
        registry
            .register(definition("articles", "articles_index", &["article"]))
            .unwrap();

        let doc = Document::new("e1", "event").with_field("title", "Moth night");
        let outcomes = registry.upsert_document(&doc);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].0, "events");
        assert_eq!(outcomes[0].1.as_ref().unwrap(), &UpsertOutcome::Updated);

        assert_eq!(registry.remove_document(&doc).unwrap(), 1);
        assert_eq!(registry.remove_document(&doc).unwrap(), 0);
    }

    #[test]
    fn test_clear() {
        let mut registry = registry();
        registry
            .register(definition("events", "events_index", &["event"]))
            .unwrap();
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.names().is_empty());
    }
}
