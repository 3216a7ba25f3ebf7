//! Shared SQLite connection handle.
//!
//! Every component issues its SQL through a [`Database`]. The connection sits
//! behind `Arc<Mutex<_>>` so managers, the registry and the search index can
//! share one file and writers are serialized within the process.

use crate::config::IndexConfig;
use crate::{Result, SiteIndexError};
use regex::Regex;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};
use tracing::debug;

/// Identifiers that may be spliced into SQL text.
static IDENTIFIER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Validate a table or column name and return it double-quoted.
///
/// Values always travel as bound parameters; identifiers cannot, so they are
/// restricted to plain word characters instead.
pub fn quote_identifier(name: &str) -> Result<String> {
    if IDENTIFIER_PATTERN.is_match(name) {
        Ok(format!("\"{}\"", name))
    } else {
        Err(SiteIndexError::invalid_argument(format!(
            "Invalid identifier: {:?}",
            name
        )))
    }
}

/// Cloneable handle to a single SQLite connection.
#[derive(Clone)]
pub struct Database {
    path: Option<PathBuf>,
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a database file.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| SiteIndexError::io_with_path(e, parent))?;
            }
        }

        let conn = Connection::open(&db_path)?;
        Self::configure_connection(&conn)?;
        debug!("Opened index database at {}", db_path.display());

        Ok(Self {
            path: Some(db_path),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            path: None,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(&format!(
            "PRAGMA journal_mode=WAL;\n\
             PRAGMA busy_timeout={};\n\
             PRAGMA synchronous=NORMAL;\n\
             PRAGMA temp_store=MEMORY;",
            IndexConfig::BUSY_TIMEOUT_MS,
        ))?;
        Ok(())
    }

    /// Database file path, `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Lock the connection for exclusive use.
    pub fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| SiteIndexError::Query {
            message: "Failed to acquire connection lock".to_string(),
            source: None,
        })
    }

    /// Check whether a table exists.
    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let conn = self.lock_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Column names of a table in declaration order.
    pub fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        let conn = self.lock_conn()?;
        table_columns(&conn, table)
    }
}

/// Column names of `table`, read through an already locked connection.
pub(crate) fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let sql = format!("PRAGMA table_info({})", quote_identifier(table)?);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;

    let mut columns = Vec::new();
    for row in rows {
        columns.push(row?);
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("start_date").unwrap(), "\"start_date\"");
        assert!(quote_identifier("name; DROP TABLE x").is_err());
        assert!(quote_identifier("\"quoted\"").is_err());
        assert!(quote_identifier("1abc").is_err());
        assert!(quote_identifier("").is_err());
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested/dir/index.db");
        let db = Database::open(&db_path).unwrap();
        assert_eq!(db.path(), Some(db_path.as_path()));
        assert!(db_path.exists());
    }

    #[test]
    fn test_table_columns() {
        let db = Database::open_in_memory().unwrap();
        db.lock_conn()
            .unwrap()
            .execute_batch("CREATE TABLE t (page_id TEXT PRIMARY KEY, title TEXT)")
            .unwrap();
        assert!(db.table_exists("t").unwrap());
        assert!(!db.table_exists("missing").unwrap());
        assert_eq!(db.table_columns("t").unwrap(), vec!["page_id", "title"]);
    }
}
