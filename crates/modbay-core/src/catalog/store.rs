//! Mod catalog trait and its SQLite implementation.

use super::types::ModCatalogEntry;
use crate::db::Database;
use crate::error::{ModbayError, Result};
use crate::files::ArchiveFormat;
use rusqlite::{params, OptionalExtension, Row};
use std::collections::HashSet;
use tracing::debug;

/// Persistent mod catalog.
pub trait ModCatalog: Send + Sync {
    fn get_by_category(&self, category: &str) -> Result<Vec<ModCatalogEntry>>;

    fn get_by_hash(&self, sha: &str) -> Result<Option<ModCatalogEntry>>;

    fn exists_by_hash(&self, sha: &str) -> Result<bool>;

    /// Insert a new entry; fails if the hash is already present.
    fn insert(&self, entry: &ModCatalogEntry) -> Result<()>;

    /// Replace an existing entry; fails with `ModNotFound` otherwise.
    fn update(&self, entry: &ModCatalogEntry) -> Result<()>;

    fn list_all(&self) -> Result<Vec<ModCatalogEntry>>;

    fn list_hashes(&self) -> Result<HashSet<String>>;
}

/// SQLite-backed mod catalog.
#[derive(Clone)]
pub struct SqliteModCatalog {
    db: Database,
}

const ENTRY_COLUMNS: &str =
    "sha, name, author, category, tags_json, grading, description, format, preview, added_at";

impl SqliteModCatalog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<ModCatalogEntry> {
        let tags_json: String = row.get(4)?;
        let format: String = row.get(7)?;
        Ok(ModCatalogEntry {
            sha: row.get(0)?,
            name: row.get(1)?,
            author: row.get(2)?,
            category: row.get(3)?,
            tags: serde_json::from_str(&tags_json).unwrap_or_default(),
            grading: row.get(5)?,
            description: row.get(6)?,
            format: ArchiveFormat::from_tag(&format),
            preview: row.get(8)?,
            added_at: row.get(9)?,
        })
    }

    fn query_entries(&self, sql: &str, param: Option<&str>) -> Result<Vec<ModCatalogEntry>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = match param {
            Some(p) => stmt
                .query_map(params![p], Self::row_to_entry)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
            None => stmt
                .query_map([], Self::row_to_entry)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
        };
        Ok(rows)
    }
}

impl ModCatalog for SqliteModCatalog {
    fn get_by_category(&self, category: &str) -> Result<Vec<ModCatalogEntry>> {
        self.query_entries(
            &format!("SELECT {ENTRY_COLUMNS} FROM mods WHERE category = ?1 ORDER BY rowid"),
            Some(category),
        )
    }

    fn get_by_hash(&self, sha: &str) -> Result<Option<ModCatalogEntry>> {
        let conn = self.db.lock()?;
        let entry = conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM mods WHERE sha = ?1"),
                params![sha],
                Self::row_to_entry,
            )
            .optional()?;
        Ok(entry)
    }

    fn exists_by_hash(&self, sha: &str) -> Result<bool> {
        let conn = self.db.lock()?;
        let exists = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM mods WHERE sha = ?1)",
            params![sha],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn insert(&self, entry: &ModCatalogEntry) -> Result<()> {
        let tags_json = serde_json::to_string(&entry.tags)?;
        let conn = self.db.lock()?;
        conn.execute(
            "INSERT INTO mods (sha, name, author, category, tags_json, grading,
                               description, format, preview, added_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                entry.sha,
                entry.name,
                entry.author,
                entry.category,
                tags_json,
                entry.grading,
                entry.description,
                entry.format.as_str(),
                entry.preview,
                entry.added_at,
            ],
        )
        .map_err(|e| ModbayError::Database {
            message: format!("Failed to insert mod {}: {}", entry.sha, e),
            source: Some(e),
        })?;
        debug!("Inserted mod: {}", entry.sha);
        Ok(())
    }

    fn update(&self, entry: &ModCatalogEntry) -> Result<()> {
        let tags_json = serde_json::to_string(&entry.tags)?;
        let conn = self.db.lock()?;
        let updated = conn.execute(
            "UPDATE mods SET name = ?2, author = ?3, category = ?4, tags_json = ?5,
                             grading = ?6, description = ?7, format = ?8, preview = ?9
             WHERE sha = ?1",
            params![
                entry.sha,
                entry.name,
                entry.author,
                entry.category,
                tags_json,
                entry.grading,
                entry.description,
                entry.format.as_str(),
                entry.preview,
            ],
        )?;
        if updated == 0 {
            return Err(ModbayError::ModNotFound {
                sha: entry.sha.clone(),
            });
        }
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<ModCatalogEntry>> {
        self.query_entries(
            &format!("SELECT {ENTRY_COLUMNS} FROM mods ORDER BY rowid"),
            None,
        )
    }

    fn list_hashes(&self) -> Result<HashSet<String>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare("SELECT sha FROM mods")?;
        let hashes = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(hashes)
    }
}
