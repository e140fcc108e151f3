//! Database module for SQLite-based signal and local storage management

use crate::error::{FeedError, FeedResult};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub mod signal;
pub mod storage;

/// Shared SQLite connection
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl Database {
    /// Open (or create) a database file
    pub fn new<P: AsRef<Path>>(path: P) -> FeedResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| FeedError::DatabaseConnection(format!("{}: {}", path.display(), e)))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;

        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Create an in-memory database (for testing)
    pub fn new_in_memory() -> FeedResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| FeedError::DatabaseConnection(e.to_string()))?;

        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// Run migrations to set up or update the schema
    pub fn run_migrations(&self) -> FeedResult<()> {
        let conn = self.lock()?;

        let migration_sql = include_str!("migrations/V1__signal_schema.sql");
        conn.execute_batch(migration_sql)
            .map_err(|e| FeedError::DatabaseMigration(e.to_string()))?;

        Ok(())
    }

    /// File backing this database, `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Get a reference to the connection (for custom queries)
    pub fn get_connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    /// Lock the connection for a unit of work
    pub fn lock(&self) -> FeedResult<MutexGuard<'_, Connection>> {
        lock_connection(&self.conn)
    }

    /// Check database health
    pub fn health_check(&self) -> FeedResult<bool> {
        let conn = self.lock()?;
        let result: i32 = conn.query_row("SELECT 1", [], |row| row.get(0))?;
        Ok(result == 1)
    }
}

pub(crate) fn lock_connection(conn: &Mutex<Connection>) -> FeedResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| FeedError::Internal("database connection lock poisoned".to_string()))
}

/// Read SQLite's per-connection `data_version`, which changes whenever
/// another connection commits to the same database file.
pub fn data_version(conn: &Connection) -> FeedResult<i64> {
    Ok(conn.query_row("PRAGMA data_version", [], |row| row.get(0))?)
}
