//! Lifecycle of one index table: schema, rebuild, upsert, stats.

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::definition::{IndexDefinition, RowContext};
use super::metadata::{self, IndexMetaRecord};
use super::query::IndexQuery;
use super::value::{IndexRow, IndexValue};
use crate::config::IndexConfig;
use crate::db::{quote_identifier, table_columns, Database};
use crate::document::{Document, DocumentSource};
use crate::{Result, SiteIndexError};

/// A document left out of a rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedDocument {
    pub page_id: String,
    pub reason: String,
}

/// Outcome of a full rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildReport {
    pub name: String,
    pub row_count: usize,
    pub rebuilt_at: DateTime<Utc>,
    pub skipped: Vec<SkippedDocument>,
}

/// Read-only summary for operator reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub name: String,
    pub table: String,
    pub total_rows: usize,
    pub last_rebuild: Option<DateTime<Utc>>,
}

/// Outcome of a single-row update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UpsertOutcome {
    Updated,
    /// The document's template is not covered by this index.
    NotApplicable,
    /// Row computation failed; the stored row is unchanged.
    Skipped { reason: String },
}

/// Owner of one index table.
pub struct IndexManager {
    definition: Arc<dyn IndexDefinition>,
    db: Database,
}

impl IndexManager {
    pub fn new(definition: Arc<dyn IndexDefinition>, db: Database) -> Self {
        Self { definition, db }
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn table(&self) -> &str {
        self.definition.collection_name()
    }

    pub fn definition(&self) -> &Arc<dyn IndexDefinition> {
        &self.definition
    }

    pub fn templates(&self) -> &[String] {
        self.definition.templates()
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn schema_err(&self, message: impl Into<String>, source: Option<rusqlite::Error>) -> SiteIndexError {
        SiteIndexError::Schema {
            index: self.name().to_string(),
            message: message.into(),
            source,
        }
    }

    fn transaction_err(&self, stage: &str, e: rusqlite::Error) -> SiteIndexError {
        SiteIndexError::Transaction {
            index: self.name().to_string(),
            message: format!("{} failed: {}", stage, e),
            source: Some(e),
        }
    }

    /// Columns in storage order: primary key first, then the definition's.
    fn column_names(&self) -> Vec<String> {
        std::iter::once(IndexConfig::PRIMARY_KEY.to_string())
            .chain(self.definition.columns().into_iter().map(|c| c.name))
            .collect()
    }

    /// Create the table and its indexes if missing, adding any columns the
    /// definition gained since the table was created. Safe on every start-up.
    pub fn ensure_schema(&self) -> Result<()> {
        let table = quote_identifier(self.table())
            .map_err(|e| self.schema_err(e.to_string(), None))?;

        let mut column_sql = vec![format!(
            "{} TEXT PRIMARY KEY",
            quote_identifier(IndexConfig::PRIMARY_KEY)?
        )];
        let columns = self.definition.columns();
        for column in &columns {
            if column.name == IndexConfig::PRIMARY_KEY {
                return Err(self.schema_err(
                    format!("column {} is reserved", IndexConfig::PRIMARY_KEY),
                    None,
                ));
            }
            let name = quote_identifier(&column.name)
                .map_err(|e| self.schema_err(e.to_string(), None))?;
            column_sql.push(format!("{} {}", name, column.sql_type));
        }

        let conn = self.db.lock_conn()?;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            table,
            column_sql.join(", ")
        ))
        .map_err(|e| self.schema_err(format!("create table: {}", e), Some(e)))?;

        self.migrate_columns(&conn, &table)?;

        for ddl in self.definition.indexes() {
            conn.execute_batch(&ddl)
                .map_err(|e| self.schema_err(format!("index statement: {}", e), Some(e)))?;
        }

        metadata::ensure_meta_table(&conn)
            .map_err(|e| self.schema_err(format!("metadata table: {}", e), Some(e)))?;

        debug!("Ensured schema for index {} ({})", self.name(), self.table());
        Ok(())
    }

    fn migrate_columns(&self, conn: &Connection, quoted_table: &str) -> Result<()> {
        let existing = table_columns(conn, self.table())
            .map_err(|e| self.schema_err(format!("read columns: {}", e), None))?;

        for column in self.definition.columns() {
            if existing.iter().any(|name| name.eq_ignore_ascii_case(&column.name)) {
                continue;
            }
            conn.execute_batch(&format!(
                "ALTER TABLE {} ADD COLUMN {} {}",
                quoted_table,
                quote_identifier(&column.name)?,
                column.sql_type
            ))
            .map_err(|e| self.schema_err(format!("add column {}: {}", column.name, e), Some(e)))?;
            info!("Added column {} to index {}", column.name, self.name());
        }
        Ok(())
    }

    /// Compute a full storage row, aligned with [`Self::column_names`].
    fn compute_row(&self, document: &Document, ctx: &RowContext) -> Result<IndexRow> {
        let computed = self.definition.row_for(document, ctx)?;

        let columns = self.definition.columns();
        if let Some(unknown) = computed.columns().find(|name| {
            *name != IndexConfig::PRIMARY_KEY && !columns.iter().any(|c| c.name == *name)
        }) {
            return Err(SiteIndexError::RowComputation {
                page_id: document.page_id.clone(),
                message: format!("row sets undeclared column {}", unknown),
            });
        }

        let mut row = IndexRow::new().with(IndexConfig::PRIMARY_KEY, document.id());
        for column in columns {
            let value = computed.get(&column.name).cloned().unwrap_or(IndexValue::Null);
            row.set(column.name, value);
        }
        Ok(row)
    }

    fn insert_sql(&self) -> Result<String> {
        let names = self
            .column_names()
            .iter()
            .map(|name| quote_identifier(name))
            .collect::<Result<Vec<_>>>()?;
        let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{}", i)).collect();
        Ok(format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
            quote_identifier(self.table())?,
            names.join(", "),
            placeholders.join(", ")
        ))
    }

    /// Replace the table contents with rows for `documents`.
    ///
    /// Documents whose template the index does not cover are ignored. A
    /// document whose row cannot be computed or stored is reported in
    /// [`RebuildReport::skipped`] and the rebuild carries on. Failing to begin
    /// or commit the transaction is an error and leaves the table untouched.
    pub fn rebuild<'d, I>(&self, documents: I) -> Result<RebuildReport>
    where
        I: IntoIterator<Item = &'d Document>,
    {
        let rebuilt_at = Utc::now();
        let ctx = RowContext::new(rebuilt_at);

        let mut rows = Vec::new();
        let mut skipped = Vec::new();
        for document in documents {
            if !self.definition.applies_to(&document.template) {
                continue;
            }
            match self.compute_row(document, &ctx) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    warn!("Skipping {} in index {}: {}", document.page_id, self.name(), e);
                    skipped.push(SkippedDocument {
                        page_id: document.page_id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let insert_sql = self.insert_sql()?;
        let delete_sql = format!("DELETE FROM {}", quote_identifier(self.table())?);
        let count_sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(self.table())?);

        let mut conn = self.db.lock_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| self.transaction_err("begin", e))?;

        tx.execute(&delete_sql, [])
            .map_err(|e| self.transaction_err("clear", e))?;

        {
            let mut stmt = tx
                .prepare(&insert_sql)
                .map_err(|e| self.transaction_err("prepare insert", e))?;
            for row in &rows {
                let values: Vec<&IndexValue> = row.iter().map(|(_, value)| value).collect();
                if let Err(e) = stmt.execute(params_from_iter(values)) {
                    let page_id = row.page_id().unwrap_or_default().to_string();
                    warn!("Failed to store {} in index {}: {}", page_id, self.name(), e);
                    skipped.push(SkippedDocument {
                        page_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let row_count: i64 = tx
            .query_row(&count_sql, [], |row| row.get(0))
            .map_err(|e| self.transaction_err("count", e))?;
        let row_count = row_count as usize;

        metadata::record_rebuild(&tx, self.name(), self.table(), rebuilt_at, row_count)
            .map_err(|e| self.transaction_err("record metadata", e))?;

        tx.commit().map_err(|e| self.transaction_err("commit", e))?;

        info!(
            "Rebuilt index {}: {} rows, {} skipped",
            self.name(),
            row_count,
            skipped.len()
        );

        Ok(RebuildReport {
            name: self.name().to_string(),
            row_count,
            rebuilt_at,
            skipped,
        })
    }

    /// Rebuild from every document the source has for this index's templates.
    pub fn rebuild_from_source(&self, source: &dyn DocumentSource) -> Result<RebuildReport> {
        let documents = if self.templates().is_empty() {
            source.all_documents()?
        } else {
            let mut documents = Vec::new();
            for template in self.templates() {
                documents.extend(source.documents_for_template(template)?);
            }
            documents
        };
        self.rebuild(&documents)
    }

    /// Recompute and replace the row of one changed document.
    pub fn upsert_row(&self, document: &Document) -> Result<UpsertOutcome> {
        if !self.definition.applies_to(&document.template) {
            return Ok(UpsertOutcome::NotApplicable);
        }

        let row = match self.compute_row(document, &RowContext::new(Utc::now())) {
            Ok(row) => row,
            Err(e) => {
                warn!("Skipping {} in index {}: {}", document.page_id, self.name(), e);
                return Ok(UpsertOutcome::Skipped {
                    reason: e.to_string(),
                });
            }
        };

        let insert_sql = self.insert_sql()?;
        let mut conn = self.db.lock_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| self.transaction_err("begin", e))?;
        let values: Vec<&IndexValue> = row.iter().map(|(_, value)| value).collect();
        tx.execute(&insert_sql, params_from_iter(values))
            .map_err(|e| self.transaction_err("upsert", e))?;
        tx.commit().map_err(|e| self.transaction_err("commit", e))?;

        debug!("Upserted {} in index {}", document.page_id, self.name());
        Ok(UpsertOutcome::Updated)
    }

    /// Delete the row of a removed document.
    pub fn remove_row(&self, page_id: &str) -> Result<bool> {
        let conn = self.db.lock_conn()?;
        let rows = conn.execute(
            &format!(
                "DELETE FROM {} WHERE {} = ?1",
                quote_identifier(self.table())?,
                quote_identifier(IndexConfig::PRIMARY_KEY)?
            ),
            params![page_id],
        )?;

        if rows > 0 {
            debug!("Removed {} from index {}", page_id, self.name());
        }
        Ok(rows > 0)
    }

    /// Row count and last rebuild time.
    pub fn get_stats(&self) -> Result<IndexStats> {
        let conn = self.db.lock_conn()?;
        let total_rows: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_identifier(self.table())?),
            [],
            |row| row.get(0),
        )?;
        let last_rebuild = metadata::load(&conn, self.name())?.and_then(|m| m.last_rebuild);

        Ok(IndexStats {
            name: self.name().to_string(),
            table: self.table().to_string(),
            total_rows: total_rows as usize,
            last_rebuild,
        })
    }

    /// Persisted record of the last rebuild, if any.
    pub fn metadata(&self) -> Result<Option<IndexMetaRecord>> {
        let conn = self.db.lock_conn()?;
        metadata::load(&conn, self.name())
    }

    /// Fresh query builder over this index's table.
    pub fn query(&self) -> IndexQuery {
        IndexQuery::new(self.db.clone(), self.table())
    }

    /// The stored row for one document.
    pub fn row(&self, page_id: &str) -> Result<Option<IndexRow>> {
        self.query().where_eq(IndexConfig::PRIMARY_KEY, page_id).first()
    }
}

impl std::fmt::Debug for IndexManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexManager")
            .field("name", &self.name())
            .field("table", &self.table())
            .field("templates", &self.templates())
            .finish()
    }
}
