//! Error types for siteindex.
//!
//! Every fallible operation in the crate returns [`SiteIndexError`]. The
//! variants follow the failure points of the indexing pipeline: bad caller
//! input, schema DDL, per-document row computation, rebuild transactions and
//! plain query execution.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for siteindex.
#[derive(Debug, Error)]
pub enum SiteIndexError {
    // Caller errors
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Not found: {what}")]
    NotFound { what: String },

    // Index lifecycle errors
    #[error("Schema error for index {index}: {message}")]
    Schema {
        index: String,
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    #[error("Failed to compute row for {page_id}: {message}")]
    RowComputation { page_id: String, message: String },

    #[error("Transaction failed for index {index}: {message}")]
    Transaction {
        index: String,
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // Database errors
    #[error("Query error: {message}")]
    Query {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for siteindex operations.
pub type Result<T> = std::result::Result<T, SiteIndexError>;

impl From<std::io::Error> for SiteIndexError {
    fn from(err: std::io::Error) -> Self {
        SiteIndexError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for SiteIndexError {
    fn from(err: serde_json::Error) -> Self {
        SiteIndexError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for SiteIndexError {
    fn from(err: rusqlite::Error) -> Self {
        SiteIndexError::Query {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl SiteIndexError {
    /// Shorthand for an [`SiteIndexError::InvalidArgument`].
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        SiteIndexError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        SiteIndexError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Convert to a JSON-RPC error code.
    ///
    /// Custom error codes (application-defined, -32000 to -32099):
    /// - -32001: Index or document not found
    /// - -32002: Rebuild failed (schema or transaction)
    /// - -32602: Invalid params
    /// - -32603: Internal error
    pub fn to_rpc_error_code(&self) -> i32 {
        match self {
            SiteIndexError::InvalidArgument { .. } => -32602,
            SiteIndexError::NotFound { .. } => -32001,
            SiteIndexError::Schema { .. } | SiteIndexError::Transaction { .. } => -32002,
            _ => -32603,
        }
    }

    /// Message safe to show to end users.
    ///
    /// Database-level variants carry SQLite messages that may quote SQL, so
    /// they are replaced with a generic description.
    pub fn user_message(&self) -> String {
        match self {
            SiteIndexError::InvalidArgument { .. }
            | SiteIndexError::NotFound { .. }
            | SiteIndexError::Config { .. } => self.to_string(),
            SiteIndexError::Schema { index, .. } => {
                format!("Index {} could not be initialised", index)
            }
            SiteIndexError::Transaction { index, .. } => {
                format!("Rebuild of index {} failed", index)
            }
            SiteIndexError::RowComputation { page_id, .. } => {
                format!("Document {} could not be indexed", page_id)
            }
            _ => "Internal error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SiteIndexError::invalid_argument("operator LIKE is not allowed");
        assert_eq!(
            err.to_string(),
            "Invalid argument: operator LIKE is not allowed"
        );
    }

    #[test]
    fn test_rpc_error_codes() {
        assert_eq!(
            SiteIndexError::invalid_argument("x").to_rpc_error_code(),
            -32602
        );
        assert_eq!(
            SiteIndexError::NotFound {
                what: "index events".into()
            }
            .to_rpc_error_code(),
            -32001
        );
        assert_eq!(
            SiteIndexError::Config {
                message: "bad".into()
            }
            .to_rpc_error_code(),
            -32603
        );
    }

    #[test]
    fn test_user_message_hides_sql() {
        let err = SiteIndexError::Query {
            message: "near \"SELEC\": syntax error in SELEC * FROM events".into(),
            source: None,
        };
        assert_eq!(err.user_message(), "Internal error");

        let err = SiteIndexError::Transaction {
            index: "events".into(),
            message: "database is locked".into(),
            source: None,
        };
        assert_eq!(err.user_message(), "Rebuild of index events failed");
    }
}
