//! Persisted rebuild metadata, one record per index.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::config::IndexConfig;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexMetaRecord {
    pub name: String,
    pub table: String,
    pub last_rebuild: Option<DateTime<Utc>>,
    pub row_count: usize,
}

pub(crate) fn ensure_meta_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} (
            index_name TEXT PRIMARY KEY,
            table_name TEXT NOT NULL,
            last_rebuild TEXT,
            row_count INTEGER NOT NULL DEFAULT 0
        )",
        IndexConfig::META_TABLE
    ))
}

pub(crate) fn record_rebuild(
    conn: &Connection,
    name: &str,
    table: &str,
    rebuilt_at: DateTime<Utc>,
    row_count: usize,
) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO {} (index_name, table_name, last_rebuild, row_count)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(index_name) DO UPDATE SET
                 table_name=excluded.table_name,
                 last_rebuild=excluded.last_rebuild,
                 row_count=excluded.row_count",
            IndexConfig::META_TABLE
        ),
        params![name, table, rebuilt_at.to_rfc3339(), row_count as i64],
    )?;
    Ok(())
}

pub(crate) fn load(conn: &Connection, name: &str) -> Result<Option<IndexMetaRecord>> {
    let record = conn
        .query_row(
            &format!(
                "SELECT index_name, table_name, last_rebuild, row_count FROM {} WHERE index_name = ?1",
                IndexConfig::META_TABLE
            ),
            params![name],
            |row| {
                let last_rebuild: Option<String> = row.get(2)?;
                let row_count: i64 = row.get(3)?;
                Ok(IndexMetaRecord {
                    name: row.get(0)?,
                    table: row.get(1)?,
                    last_rebuild: last_rebuild
                        .and_then(|ts| DateTime::parse_from_rfc3339(&ts).ok())
                        .map(|ts| ts.with_timezone(&Utc)),
                    row_count: row_count.max(0) as usize,
                })
            },
        )
        .optional()?;
    Ok(record)
}
