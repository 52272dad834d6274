//! Shared SQLite connection for the classification tree and mod catalog.

use crate::error::{ModbayError, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Handle to the Modbay database.
///
/// Cheap to clone; all clones share one connection behind a mutex.
#[derive(Clone)]
pub struct Database {
    path: Option<PathBuf>,
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file and ensure the schema exists.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| ModbayError::Io {
                    message: format!("Failed to create directory {}", parent.display()),
                    path: Some(parent.to_path_buf()),
                    source: Some(e),
                })?;
            }
        }

        let conn = Connection::open(db_path).map_err(|e| ModbayError::Database {
            message: format!("Failed to open database {}: {}", db_path.display(), e),
            source: Some(e),
        })?;
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA busy_timeout=30000;
            PRAGMA synchronous=NORMAL;
            ",
        )?;

        Self::from_connection(conn, Some(db_path.to_path_buf()))
    }

    /// In-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, None)
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        Self::ensure_schema(&conn)?;
        debug!("Database ready at {:?}", path);
        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn ensure_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS classification_nodes (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                parent_id TEXT,
                priority INTEGER NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                thumbnail TEXT,
                mod_count INTEGER NOT NULL DEFAULT 0,
                position INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_classification_name
                ON classification_nodes(name);

            CREATE INDEX IF NOT EXISTS idx_classification_parent
                ON classification_nodes(parent_id);

            CREATE TABLE IF NOT EXISTS mods (
                sha TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                author TEXT,
                category TEXT NOT NULL DEFAULT '',
                tags_json TEXT NOT NULL DEFAULT '[]',
                grading TEXT,
                description TEXT,
                format TEXT NOT NULL,
                preview TEXT,
                added_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_mods_category ON mods(category);
            "#,
        )?;
        Ok(())
    }

    /// Path of the database file, `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| ModbayError::Database {
            message: "Failed to acquire connection lock".to_string(),
            source: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_file_and_schema() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("modbay.sqlite");
        let db = Database::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(db.path(), Some(path.as_path()));

        let conn = db.lock().unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('classification_nodes', 'mods')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 2);
    }

    #[test]
    fn test_reopen_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("modbay.sqlite");
        Database::open(&path).unwrap();
        assert!(Database::open(&path).is_ok());
    }
}
