//! # Schema
//!
//! Table definitions for questions and results.
//!
//! Both tables use a key assigned by the database. The statements are
//! idempotent and run at startup and from `quizapi migrate`.

use sqlx::AnyConnection;

use super::errors::{DbError, DbResult};

/// Database backend, selected from the URL scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Postgres,
    Sqlite,
}

impl Backend {
    /// Detect the backend from a connection URL
    pub fn from_url(url: &str) -> DbResult<Self> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(Backend::Postgres)
        } else if url.starts_with("sqlite:") {
            Ok(Backend::Sqlite)
        } else {
            Err(DbError::Config(format!(
                "unsupported database URL scheme: {}",
                url.split(':').next().unwrap_or_default()
            )))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Postgres => "postgres",
            Backend::Sqlite => "sqlite",
        }
    }

    /// Column definition for an auto-assigned primary key
    fn primary_key(&self) -> &'static str {
        match self {
            Backend::Postgres => "id BIGSERIAL PRIMARY KEY",
            Backend::Sqlite => "id INTEGER PRIMARY KEY AUTOINCREMENT",
        }
    }
}

/// The DDL statements for `backend`, in execution order
pub fn statements(backend: Backend) -> Vec<String> {
    vec![
        format!(
            "CREATE TABLE IF NOT EXISTS questions (
                {},
                question TEXT NOT NULL,
                option_a TEXT NOT NULL,
                option_b TEXT NOT NULL,
                option_c TEXT NOT NULL,
                option_d TEXT NOT NULL,
                answer TEXT NOT NULL,
                image TEXT,
                grade TEXT,
                lesson BIGINT
            )",
            backend.primary_key()
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS results (
                {},
                username TEXT NOT NULL,
                class_name TEXT,
                lesson_from BIGINT,
                lesson_to BIGINT,
                total_questions BIGINT,
                score BIGINT NOT NULL,
                answers TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            backend.primary_key()
        ),
        "CREATE INDEX IF NOT EXISTS idx_questions_grade_lesson ON questions (grade, lesson)"
            .to_string(),
        "CREATE INDEX IF NOT EXISTS idx_results_leaderboard ON results (score DESC, created_at DESC)"
            .to_string(),
        "CREATE INDEX IF NOT EXISTS idx_results_username ON results (username)".to_string(),
    ]
}

/// Create any missing tables and indexes
pub async fn migrate(conn: &mut AnyConnection, backend: Backend) -> DbResult<()> {
    for statement in statements(backend) {
        sqlx::query(&statement).execute(&mut *conn).await?;
    }
    tracing::info!(backend = backend.as_str(), "schema up to date");
    Ok(())
}
