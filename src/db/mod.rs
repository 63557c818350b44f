//! # Database Layer
//!
//! Connection pool, schema, parameterized filters and the statements the
//! HTTP handlers run. PostgreSQL in production, SQLite for local runs and
//! tests, both through the sqlx `Any` driver.

pub mod config;
pub mod errors;
pub mod filter;
pub mod pool;
pub mod queries;
pub mod schema;

pub use config::{DatabaseConfig, PgParams};
pub use errors::{DbError, DbResult};
pub use filter::{Column, FilterExpr, FilterOperator, FilterSet, SqlValue};
pub use pool::{ConnectionPool, Lease};
pub use schema::{migrate, Backend};
