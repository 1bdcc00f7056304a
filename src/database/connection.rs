/*!
 * Database connection management.
 *
 * One SQLite connection behind a mutex. Async callers go through
 * `spawn_blocking` so queries never stall the runtime.
 */

use anyhow::{Context, Result};
use log::{debug, info};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::schema;

const DEFAULT_DB_FILENAME: &str = "dubsync.db";

const DEFAULT_DB_DIRNAME: &str = "dubsync";

/// Database connection wrapper with thread-safe access
#[derive(Clone)]
pub struct DatabaseConnection {
    db_path: PathBuf,
    connection: Arc<Mutex<Connection>>,
}

impl DatabaseConnection {
    /// Create a new database connection at the default location
    pub fn new_default() -> Result<Self> {
        let db_path = Self::default_database_path()?;
        Self::new(&db_path)
    }

    /// Create a new database connection at the specified path
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
        }

        info!("Opening database at: {:?}", db_path);

        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open database: {:?}", db_path))?;
        schema::initialize_schema(&conn)?;

        Ok(Self {
            db_path,
            connection: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database (for testing and cache-less runs)
    pub fn new_in_memory() -> Result<Self> {
        debug!("Creating in-memory database");

        let conn = Connection::open_in_memory().context("Failed to create in-memory database")?;
        schema::initialize_schema(&conn)?;

        Ok(Self {
            db_path: PathBuf::from(":memory:"),
            connection: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn default_database_path() -> Result<PathBuf> {
        let base_dir = dirs::data_local_dir()
            .or_else(dirs::data_dir)
            .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;

        Ok(base_dir.join(DEFAULT_DB_DIRNAME).join(DEFAULT_DB_FILENAME))
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Execute a database operation with the connection
    pub fn execute<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .connection
            .lock()
            .map_err(|e| anyhow::anyhow!("Failed to acquire database lock: {}", e))?;

        f(&conn)
    }

    /// Execute a database operation asynchronously using spawn_blocking
    pub async fn execute_async<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.connection.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| anyhow::anyhow!("Failed to acquire database lock: {}", e))?;

            f(&conn)
        })
        .await
        .context("Database task panicked")?
    }

    /// Run `f` inside a transaction on a blocking thread
    pub async fn transaction_async<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&rusqlite::Transaction) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.connection.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| anyhow::anyhow!("Failed to acquire database lock: {}", e))?;

            let tx = conn.transaction()?;
            let result = f(&tx)?;
            tx.commit()?;

            Ok(result)
        })
        .await
        .context("Database transaction task panicked")?
    }

    pub fn stats(&self) -> Result<DatabaseStats> {
        self.execute(|conn| {
            let count = |table: &str| -> i64 {
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
                    .unwrap_or(0)
            };

            Ok(DatabaseStats {
                run_count: count("runs"),
                stage_row_count: count("stage_rows"),
                cache_count: count("completion_cache"),
            })
        })
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub run_count: i64,
    pub stage_row_count: i64,
    pub cache_count: i64,
}

impl std::fmt::Display for DatabaseStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Runs: {}, Stage rows: {}, Cached responses: {}",
            self.run_count, self.stage_row_count, self.cache_count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newInMemory_shouldCreateValidConnection() {
        let db = DatabaseConnection::new_in_memory().expect("Failed to create in-memory DB");
        assert_eq!(db.path().to_string_lossy(), ":memory:");
    }

    #[test]
    fn test_stats_emptyDatabase_shouldCountZero() {
        let db = DatabaseConnection::new_in_memory().expect("Failed to create DB");
        let stats = db.stats().expect("Failed to get stats");
        assert_eq!(stats.run_count, 0);
        assert_eq!(stats.cache_count, 0);
    }

    #[tokio::test]
    async fn test_transactionAsync_insert_shouldCommit() {
        let db = DatabaseConnection::new_in_memory().expect("Failed to create DB");

        db.transaction_async(|tx| {
            tx.execute(
                "INSERT INTO runs (id, transcript_hash, source_language, target_language, created_at)
                 VALUES ('run-1', 'hash', 'en', 'zh', datetime('now'))",
                [],
            )?;
            Ok(())
        })
        .await
        .expect("Async transaction failed");

        let count: i64 = db
            .execute_async(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_new_filePath_shouldCreateParentDirectory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("dubsync.db");
        let db = DatabaseConnection::new(&path).expect("Failed to open DB");
        assert!(path.exists());
        assert_eq!(db.path(), path.as_path());
    }
}
