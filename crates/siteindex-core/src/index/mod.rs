//! Structured content indexes.
//!
//! Each index is a denormalized table with one row per document. This module
//! provides:
//! - The [`IndexDefinition`] contract and a config-driven [`MappedDefinition`]
//! - [`IndexManager`] for schema, rebuild and incremental updates
//! - [`IndexRegistry`] to look managers up by name or template
//! - [`IndexQuery`], a parameterized query builder over one table

mod definition;
mod manager;
mod mapped;
mod metadata;
mod query;
mod registry;
mod value;

pub use definition::{plain_text, ColumnDef, IndexDefinition, RowContext};
pub use manager::{IndexManager, IndexStats, RebuildReport, SkippedDocument, UpsertOutcome};
pub use mapped::{ColumnKind, MappedColumn, MappedDefinition};
pub use metadata::IndexMetaRecord;
pub use query::{IndexQuery, Operator, SortDirection};
pub use registry::IndexRegistry;
pub use value::{IndexRow, IndexValue};
