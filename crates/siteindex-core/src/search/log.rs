//! Persisted log of search queries, used for keyword popularity.

use chrono::Utc;
use rusqlite::{params, Connection};

use crate::config::IndexConfig;
use crate::text::{extract_keyword_counts, KeywordCount, DEFAULT_STOP_WORDS};
use crate::Result;

pub(crate) fn ensure_log_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            query TEXT NOT NULL,
            result_count INTEGER NOT NULL DEFAULT 0,
            searched_at TEXT NOT NULL
        )",
        IndexConfig::SEARCH_LOG_TABLE
    ))
}

/// Append a query. Blank queries are not logged.
pub(crate) fn record(conn: &Connection, query: &str, result_count: usize) -> Result<bool> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(false);
    }
    conn.execute(
        &format!(
            "INSERT INTO {} (query, result_count, searched_at) VALUES (?1, ?2, ?3)",
            IndexConfig::SEARCH_LOG_TABLE
        ),
        params![query, result_count as i64, Utc::now().to_rfc3339()],
    )?;
    Ok(true)
}

/// Logged queries, oldest first.
pub(crate) fn queries(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT query FROM {} ORDER BY id",
        IndexConfig::SEARCH_LOG_TABLE
    ))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut queries = Vec::new();
    for row in rows {
        queries.push(row?);
    }
    Ok(queries)
}

pub(crate) fn popular_keywords(conn: &Connection, limit: usize) -> Result<Vec<KeywordCount>> {
    let queries = queries(conn)?;
    Ok(extract_keyword_counts(&queries, DEFAULT_STOP_WORDS, limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_popular() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_log_table(&conn).unwrap();

        assert!(!record(&conn, "   ", 0).unwrap());
        for query in ["moth traps", "Moth night", "the garden", "garden moth"] {
            assert!(record(&conn, query, 3).unwrap());
        }

        assert_eq!(queries(&conn).unwrap().len(), 4);
        let popular = popular_keywords(&conn, 2).unwrap();
        assert_eq!(popular[0], KeywordCount { keyword: "moth".into(), count: 3 });
        assert_eq!(popular[1], KeywordCount { keyword: "garden".into(), count: 2 });
    }
}
