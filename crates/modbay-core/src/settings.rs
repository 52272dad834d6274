//! Application settings persisted as one JSON document.
//!
//! Writes go through a temp file that is synced and renamed over the
//! target, so a crash never leaves a half-written settings file.

use crate::config::PathsConfig;
use crate::error::{ModbayError, Result};
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// JSON settings file inside the data root.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(data_root: &Path) -> Self {
        Self {
            path: PathsConfig::settings_path(data_root),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the settings object, or `None` when no file exists yet.
    pub fn load(&self) -> Result<Option<Map<String, Value>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)
            .map_err(|e| ModbayError::io_with_path(e, &self.path))?;
        match serde_json::from_str::<Value>(&contents)? {
            Value::Object(map) => Ok(Some(map)),
            _ => Err(ModbayError::parse(&self.path, "settings root is not an object")),
        }
    }

    /// Set top-level keys, keeping every other key already stored.
    pub fn update(&self, values: Map<String, Value>) -> Result<()> {
        let mut settings = self.load()?.unwrap_or_default();
        for (key, value) in values {
            settings.insert(key, value);
        }
        self.save(&settings)
    }

    /// Replace the whole settings document atomically.
    pub fn save(&self, settings: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ModbayError::Io {
                message: format!("Failed to create directory {}", parent.display()),
                path: Some(parent.to_path_buf()),
                source: Some(e),
            })?;
        }

        let serialized = serde_json::to_string_pretty(settings)?;
        let temp_path = self
            .path
            .with_extension(format!("json.{}.tmp", std::process::id()));

        {
            let mut file = std::fs::File::create(&temp_path)
                .map_err(|e| ModbayError::io_with_path(e, &temp_path))?;
            file.write_all(serialized.as_bytes())
                .map_err(|e| ModbayError::io_with_path(e, &temp_path))?;
            file.sync_all()
                .map_err(|e| ModbayError::io_with_path(e, &temp_path))?;
        }

        std::fs::rename(&temp_path, &self.path).map_err(|e| ModbayError::Io {
            message: format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                self.path.display()
            ),
            path: Some(self.path.clone()),
            source: Some(e),
        })?;

        debug!("Saved settings to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_is_none() {
        let temp = TempDir::new().unwrap();
        assert!(SettingsStore::new(temp.path()).load().unwrap().is_none());
    }

    #[test]
    fn test_update_keeps_other_keys() {
        let temp = TempDir::new().unwrap();
        let store = SettingsStore::new(temp.path());

        let mut first = Map::new();
        first.insert("theme".into(), json!("dark"));
        store.update(first).unwrap();

        let mut second = Map::new();
        second.insert("legacy".into(), json!({"gamePath": "/g"}));
        store.update(second).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded["theme"], json!("dark"));
        assert_eq!(loaded["legacy"]["gamePath"], json!("/g"));
        assert!(!temp.path().read_dir().unwrap().any(|e| {
            e.unwrap().file_name().to_string_lossy().ends_with(".tmp")
        }));
    }

    #[test]
    fn test_non_object_settings_is_parse_error() {
        let temp = TempDir::new().unwrap();
        let store = SettingsStore::new(temp.path());
        std::fs::write(store.path(), "[1, 2]").unwrap();
        assert!(matches!(store.load(), Err(ModbayError::Parse { .. })));
    }
}
