//! # Connection Pool
//!
//! A bounded pool of database connections handed out as [`Lease`]s.
//!
//! The pool is built once at process start and passed to handlers through
//! shared state. A lease goes back to the pool when it is dropped, so every
//! exit path of a handler (success, error, panic unwinding) releases it
//! exactly once.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sqlx::any::AnyPoolOptions;
use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyConnection, AnyPool};

use super::config::DatabaseConfig;
use super::errors::{DbError, DbResult};
use super::schema::Backend;

/// Shared handle to the connection pool
#[derive(Clone)]
pub struct ConnectionPool {
    pool: AnyPool,
    backend: Backend,
    in_use: Arc<AtomicUsize>,
}

impl ConnectionPool {
    /// Open the pool using the bounds in `config`
    ///
    /// Opens one connection eagerly so that a bad URL fails at startup.
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        config.validate()?;
        let url = config.connection_url()?;
        let backend = Backend::from_url(url)?;

        sqlx::any::install_default_drivers();

        let pool = AnyPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(url)
            .await
            .map_err(DbError::Unavailable)?;

        tracing::info!(
            backend = backend.as_str(),
            min_connections = config.min_connections,
            max_connections = config.max_connections,
            "database pool ready"
        );

        Ok(Self {
            pool,
            backend,
            in_use: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Borrow a connection for the duration of one request
    pub async fn acquire(&self) -> DbResult<Lease> {
        let conn = self.pool.acquire().await.map_err(DbError::Unavailable)?;
        self.in_use.fetch_add(1, Ordering::SeqCst);
        Ok(Lease {
            conn,
            _guard: InUseGuard(Arc::clone(&self.in_use)),
        })
    }

    /// Number of leases currently held by callers
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::SeqCst)
    }

    /// Open connections, idle or leased
    pub fn size(&self) -> u32 {
        self.pool.size()
    }

    /// Open connections waiting in the pool
    pub fn idle(&self) -> usize {
        self.pool.num_idle()
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Close every connection; pending and future acquires fail
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("database pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

/// An exclusively owned connection borrowed from a [`ConnectionPool`]
///
/// Dereferences to the driver connection, so it can be passed anywhere a
/// `&mut AnyConnection` is expected.
pub struct Lease {
    conn: PoolConnection<Any>,
    _guard: InUseGuard,
}

impl Lease {
    /// Return the connection to the pool now instead of at end of scope
    pub fn release(self) {
        drop(self);
    }
}

impl Deref for Lease {
    type Target = AnyConnection;

    fn deref(&self) -> &AnyConnection {
        &self.conn
    }
}

impl DerefMut for Lease {
    fn deref_mut(&mut self) -> &mut AnyConnection {
        &mut self.conn
    }
}

/// Decrements the in-use counter once, after the connection field is dropped
struct InUseGuard(Arc<AtomicUsize>);

impl Drop for InUseGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Pool on a fresh SQLite file inside `dir`, schema applied
    pub async fn sqlite_pool(dir: &tempfile::TempDir) -> ConnectionPool {
        let path = dir.path().join("quiz.db");
        let config = DatabaseConfig::with_url(format!("sqlite://{}?mode=rwc", path.display()));
        let pool = ConnectionPool::connect(&config).await.unwrap();
        let mut lease = pool.acquire().await.unwrap();
        crate::db::schema::migrate(&mut lease, pool.backend())
            .await
            .unwrap();
        pool
    }
}
