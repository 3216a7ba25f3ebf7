//! siteindex - embedded site search and structured content indexes.
//!
//! The crate keeps denormalized SQLite tables in step with a CMS page tree:
//! one table per registered index definition plus a site-wide search table.
//! It has no HTTP layer of its own; see the `siteindex-rpc` crate for that.
//!
//! # Example
//!
//! ```rust,no_run
//! use siteindex::{Document, MemoryDocumentSource, SearchOptions, SiteIndex, SiteIndexConfig};
//!
//! fn main() -> siteindex::Result<()> {
//!     let site = SiteIndex::open("data/index.db", SiteIndexConfig::default())?;
//!
//!     let source = MemoryDocumentSource::new(vec![Document::new("p1", "article")
//!         .with_field("title", "Garden moths")]);
//!     site.rebuild_all(&source);
//!
//!     let results = site.search().search("moths", &SearchOptions::default())?;
//!     println!("{} matches", results.total);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod db;
pub mod document;
pub mod error;
pub mod index;
pub mod search;
pub mod text;

mod api;

pub use api::{RebuildAllReport, SiteIndex};
pub use config::{IndexConfig, ScoringConfig, SearchConfig, SiteIndexConfig};
pub use db::Database;
pub use document::{Document, DocumentSource, MemoryDocumentSource};
pub use error::{Result, SiteIndexError};
pub use index::{
    ColumnDef, ColumnKind, IndexDefinition, IndexManager, IndexQuery, IndexRegistry, IndexRow,
    IndexStats, IndexValue, MappedColumn, MappedDefinition, Operator, RebuildReport, RowContext,
    SkippedDocument, SortDirection, UpsertOutcome,
};
pub use search::{FullTextSearchIndex, SearchHit, SearchOptions, SearchResults};
