// Database connection manager for local SQLite storage
// Handles app data directory resolution and the shared connection

use rusqlite::{Connection, Result as SqliteResult};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Failed to get app data directory")]
    AppDataDir,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("Database lock poisoned")]
    LockPoisoned,
}

impl StorageError {
    pub fn validation(message: impl Into<String>) -> Self {
        StorageError::Validation(message.into())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Database manager for local SQLite storage
pub struct DatabaseManager {
    connection: Mutex<Connection>,
    db_path: PathBuf,
}

impl DatabaseManager {
    /// Create a new database manager with the given database path
    pub fn new(db_path: PathBuf) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let connection = Connection::open(&db_path)?;
        connection.execute_batch("PRAGMA foreign_keys = ON;")?;

        let manager = Self {
            connection: Mutex::new(connection),
            db_path,
        };

        manager.init_schema()?;
        info!(path = %manager.db_path.display(), "Clip database opened");

        Ok(manager)
    }

    /// Get the database path
    pub fn db_path(&self) -> &PathBuf {
        &self.db_path
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.connection.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> StorageResult<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            -- Folders: user-defined categories for clips
            CREATE TABLE IF NOT EXISTS folders (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                color TEXT,
                created_at INTEGER NOT NULL
            );

            -- Clips: captured page/video content plus AI annotations
            CREATE TABLE IF NOT EXISTS clips (
                id TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                url TEXT NOT NULL,
                title TEXT NOT NULL,
                raw_text_snippet TEXT NOT NULL DEFAULT '',
                raw_text_full TEXT,
                summary TEXT,
                key_points TEXT NOT NULL DEFAULT '[]',
                tags TEXT NOT NULL DEFAULT '[]',
                folder_id TEXT,
                images TEXT,
                ai_categories TEXT,
                ai_scenarios TEXT,
                ai_rating INTEGER,
                personal_comment TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (folder_id) REFERENCES folders(id) ON DELETE SET NULL
            );

            -- Key-value store for settings
            CREATE TABLE IF NOT EXISTS app_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_clips_created_at ON clips(created_at);
            CREATE INDEX IF NOT EXISTS idx_clips_folder_id ON clips(folder_id);
            CREATE INDEX IF NOT EXISTS idx_clips_source ON clips(source);
            CREATE INDEX IF NOT EXISTS idx_clips_url ON clips(url);
            CREATE INDEX IF NOT EXISTS idx_folders_created_at ON folders(created_at);
            "#,
        )?;

        // Migration: personal_comment arrived after the first annotation release
        let has_personal_comment: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM pragma_table_info('clips') WHERE name = 'personal_comment'",
            [],
            |row| row.get(0),
        )?;

        if !has_personal_comment {
            debug!("Adding personal_comment column to clips");
            conn.execute("ALTER TABLE clips ADD COLUMN personal_comment TEXT", [])?;
        }

        Ok(())
    }

    /// Execute a function with database connection access
    pub fn with_connection<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> SqliteResult<T>,
    {
        let conn = self.lock()?;
        f(&conn).map_err(StorageError::from)
    }

    /// Execute a function with mutable database connection access.
    /// Unlike `with_connection`, the closure may return any storage error,
    /// which lets transactional code mix validation with SQL.
    pub fn with_connection_mut<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut Connection) -> StorageResult<T>,
    {
        let mut conn = self.lock()?;
        f(&mut conn)
    }
}

/// Get the default database path in the app data directory
pub fn get_default_db_path() -> StorageResult<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "clip", "clip-store")
        .ok_or(StorageError::AppDataDir)?;

    let data_dir = proj_dirs.data_dir();
    Ok(data_dir.join("clip-store.db"))
}

/// Current time in Unix epoch milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::DatabaseManager;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    /// Fresh database in the temp dir, unique per process and call
    pub fn create_test_db(prefix: &str) -> (DatabaseManager, PathBuf) {
        let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let db_path = std::env::temp_dir().join(format!(
            "clip_{}_test_{}_{}.db",
            prefix,
            std::process::id(),
            counter
        ));
        let _ = std::fs::remove_file(&db_path);
        let manager = DatabaseManager::new(db_path.clone()).unwrap();
        (manager, db_path)
    }
}
