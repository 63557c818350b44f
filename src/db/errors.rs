//! # Database Errors
//!
//! Error types for the connection pool and query layer.

use thiserror::Error;

/// Result type for database operations
pub type DbResult<T> = Result<T, DbError>;

/// Database errors
///
/// Driver detail stays in these values. Handlers log it and answer the
/// client with a generic message.
#[derive(Debug, Error)]
pub enum DbError {
    /// Pool exhausted, acquire timed out or the server refused the connection
    #[error("Database unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),

    /// Statement execution failed
    #[error("Query failed: {0}")]
    Query(#[from] sqlx::Error),

    /// Connection settings could not be resolved
    #[error("Invalid database configuration: {0}")]
    Config(String),
}

impl DbError {
    /// Whether the failure happened before any statement ran
    pub fn is_unavailable(&self) -> bool {
        matches!(self, DbError::Unavailable(_))
    }
}
