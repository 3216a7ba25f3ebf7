//! Integration tests for the SiteIndex public interface.
//!
//! These run against on-disk databases so that persistence across reopen is
//! covered along with the query and search paths.

use chrono::NaiveDate;
use serde_json::json;
use siteindex::{
    Database, Document, IndexManager, IndexQuery, MemoryDocumentSource, SearchOptions,
    SiteIndex, SiteIndexConfig, SiteIndexError, SortDirection,
};
use std::sync::Arc;
use tempfile::TempDir;

fn config() -> SiteIndexConfig {
    SiteIndexConfig::from_json(
        r#"{
            "indexes": [
                {
                    "name": "events",
                    "collection": "events_index",
                    "templates": ["event"],
                    "columns": [
                        { "name": "title", "required": true },
                        { "name": "start_date", "kind": "date" },
                        { "name": "categories", "kind": "list" },
                        { "name": "featured", "kind": "flag" }
                    ],
                    "indexes": [
                        "CREATE INDEX IF NOT EXISTS idx_events_start ON events_index(start_date)"
                    ]
                }
            ],
            "search": { "templates": ["article", "event"] }
        }"#,
    )
    .expect("valid config")
}

fn source() -> MemoryDocumentSource {
    MemoryDocumentSource::new(vec![
        Document::new("e1", "event")
            .with_field("title", "Moth night")
            .with_field("start_date", "2025-06-01")
            .with_field("categories", json!(["Insects", "Night walks"]))
            .with_field("featured", true),
        Document::new("e2", "event")
            .with_field("title", "Fungus foray")
            .with_field("start_date", "2025-10-12")
            .with_field("categories", json!(["Botany", "Fungi"])),
        Document::new("e3", "event")
            .with_field("title", "Bot building workshop")
            .with_field("start_date", "2025-12-01")
            .with_field("categories", json!(["Bot"])),
        Document::new("e4", "event").with_field("start_date", "2025-07-01"),
        Document::new("a1", "article")
            .with_field("title", "Garden moths")
            .with_field("body", "<p>Moth traps and <a href=\"/moth\">more</a>.</p>"),
        Document::new("h1", "home").with_field("title", "Welcome moth fans"),
    ])
}

fn create_test_env() -> (TempDir, SiteIndex) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let site = SiteIndex::open(temp_dir.path().join("index.db"), config()).unwrap();
    (temp_dir, site)
}

#[test]
fn test_rebuild_all_reports_each_index() {
    let (_dir, site) = create_test_env();
    let report = site.rebuild_all(&source());

    assert!(report.failures.is_empty());
    let events = &report.reports[0];
    assert_eq!(events.name, "events");
    assert_eq!(events.row_count, 3);
    assert_eq!(events.skipped.len(), 1);
    assert_eq!(events.skipped[0].page_id, "e4");

    let search = &report.reports[1];
    assert_eq!(search.name, "search");
    // the home page is outside the searchable templates
    assert_eq!(search.row_count, 5);
}

#[test]
fn test_rebuild_is_idempotent() {
    let (_dir, site) = create_test_env();
    site.rebuild_all(&source());
    let events = site.registry().require("events").unwrap();
    let before = events.query().order_by("page_id", SortDirection::Asc).get().unwrap();

    site.rebuild_all(&source());
    let after = events.query().order_by("page_id", SortDirection::Asc).get().unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_contains_matches_whole_items() {
    let (_dir, site) = create_test_env();
    site.rebuild_all(&source());
    let events = site.registry().require("events").unwrap();

    let bot = events.query().where_contains("categories", "Bot").get_page_ids().unwrap();
    assert_eq!(bot, vec!["e3"]);

    let any = events
        .query()
        .where_contains_any("categories", &["Fungi", "Insects"])
        .order_by("start_date", SortDirection::Asc)
        .get_page_ids()
        .unwrap();
    assert_eq!(any, vec!["e1", "e2"]);
}

#[test]
fn test_date_filters_and_paging() {
    let (_dir, site) = create_test_env();
    site.rebuild_all(&source());
    let events = site.registry().require("events").unwrap();

    let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
    let summer = events
        .query()
        .where_date_between("start_date", d("2025-06-01"), d("2025-10-12"))
        .order_by("start_date", SortDirection::Desc)
        .get_page_ids()
        .unwrap();
    assert_eq!(summer, vec!["e2", "e1"]);

    let upcoming = events
        .query()
        .where_date_on_or_after("start_date", d("2025-10-01"))
        .order_by("start_date", SortDirection::Asc);
    assert_eq!(upcoming.count().unwrap(), 2);
    assert_eq!(upcoming.clone().limit(1).get_page_ids().unwrap(), vec!["e2"]);
    assert_eq!(upcoming.offset(1).get_page_ids().unwrap(), vec!["e3"]);

    let featured = events.query().where_true("featured").get_page_ids().unwrap();
    assert_eq!(featured, vec!["e1"]);
}

#[test]
fn test_invalid_operator_rejected() {
    let (_dir, site) = create_test_env();
    let events = site.registry().require("events").unwrap();
    let result = events.query().where_op("title", "LIKE", "%moth%");
    assert!(matches!(result, Err(SiteIndexError::InvalidArgument { .. })));
}

#[test]
fn test_stats_persist_across_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("index.db");

    let rebuilt_at = {
        let site = SiteIndex::open(&path, config()).unwrap();
        let report = site.rebuild_all(&source());
        report.reports[0].rebuilt_at
    };

    let site = SiteIndex::open(&path, config()).unwrap();
    let stats = site.get_stats("events").unwrap();
    assert_eq!(stats.total_rows, 3);
    assert_eq!(
        stats.last_rebuild.map(|ts| ts.timestamp()),
        Some(rebuilt_at.timestamp())
    );
    assert_eq!(site.all_stats().unwrap().len(), 2);
    assert!(matches!(
        site.get_stats("missing"),
        Err(SiteIndexError::NotFound { .. })
    ));
}

#[test]
fn test_schema_migration_adds_new_column() {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(temp_dir.path().join("index.db")).unwrap();

    let v1: siteindex::MappedDefinition = serde_json::from_value(json!({
        "name": "events",
        "collection": "events_index",
        "templates": ["event"],
        "columns": [{ "name": "title" }]
    }))
    .unwrap();
    IndexManager::new(Arc::new(v1.clone()), db.clone())
        .ensure_schema()
        .unwrap();

    let v2 = v1.with_column(siteindex::MappedColumn::new(
        "venue",
        siteindex::ColumnKind::Text,
    ));
    let manager = IndexManager::new(Arc::new(v2), db.clone());
    manager.ensure_schema().unwrap();
    assert_eq!(
        db.table_columns("events_index").unwrap(),
        vec!["page_id", "title", "venue"]
    );

    let doc = Document::new("e1", "event")
        .with_field("title", "Moth night")
        .with_field("venue", "Walled garden");
    manager.rebuild(&[doc]).unwrap();
    let row = IndexQuery::new(db, "events_index").first().unwrap().unwrap();
    assert_eq!(row.get_str("venue"), Some("Walled garden"));
}

#[test]
fn test_search_and_highlight() {
    let (_dir, site) = create_test_env();
    site.rebuild_all(&source());

    let results = site
        .search()
        .search("moth", &SearchOptions::default())
        .unwrap();
    let ids: Vec<&str> = results.hits.iter().map(|h| h.page_id.as_str()).collect();
    assert_eq!(results.total, 2);
    assert_eq!(ids, vec!["a1", "e1"]);

    let html = site
        .search()
        .highlight(r#"<a href="/moth">Moth night</a>"#, "moth");
    assert_eq!(
        html,
        r#"<a href="/moth"><span class="highlight">Moth</span> night</a>"#
    );
}

#[test]
fn test_incremental_updates() {
    let (_dir, site) = create_test_env();
    site.rebuild_all(&source());

    let changed = Document::new("e2", "event")
        .with_field("title", "Moth and fungus foray")
        .with_field("start_date", "2025-10-12");
    let outcomes = site.upsert_document(&changed);
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|(_, r)| r.is_ok()));

    let results = site
        .search()
        .search("moth", &SearchOptions::default())
        .unwrap();
    assert_eq!(results.total, 3);

    assert_eq!(site.remove_document(&changed).unwrap(), 2);
    assert_eq!(site.get_stats("events").unwrap().total_rows, 2);
}

#[test]
fn test_code_defined_index_cannot_claim_search_table() {
    let temp_dir = TempDir::new().unwrap();
    let mut site = SiteIndex::open(temp_dir.path().join("index.db"), config()).unwrap();

    let pages = siteindex::MappedDefinition::new("pages", "search_index", vec!["page".into()]);
    let err = site.registry_mut().register(Arc::new(pages)).unwrap_err();
    assert!(matches!(err, SiteIndexError::InvalidArgument { .. }));

    let talks = siteindex::MappedDefinition::new("talks", "events_index", vec!["talk".into()]);
    let err = site.registry_mut().register(Arc::new(talks)).unwrap_err();
    assert!(matches!(err, SiteIndexError::InvalidArgument { .. }));
    assert_eq!(site.registry().names(), vec!["events"]);
}
