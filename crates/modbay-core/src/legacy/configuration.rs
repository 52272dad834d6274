//! Legacy configuration parser.
//!
//! Two files feed the configuration: the installation-wide
//! `local/configuration` and the per-environment
//! `home/{env}/configuration`. Both are JSON objects in current legacy
//! releases; older releases wrote `key = value` lines, which are accepted
//! too. Per-environment values win.

use super::{ini_lines, read_legacy_text, IniLine};
use crate::error::{ModbayError, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Merged legacy configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyConfiguration {
    pub values: Map<String, Value>,
    /// Files that contributed, lowest precedence first.
    pub sources: Vec<PathBuf>,
}

impl LegacyConfiguration {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Parse and merge the local and per-environment configuration files.
///
/// Returns `None` when neither file exists.
pub async fn parse_configuration(
    local: &Path,
    environment: &Path,
) -> Result<Option<LegacyConfiguration>> {
    let mut merged = LegacyConfiguration::default();

    for path in [local, environment] {
        if !path.is_file() {
            debug!("No configuration file at {}", path.display());
            continue;
        }
        let values = read_configuration_file(path).await?;
        merge_values(&mut merged.values, values);
        merged.sources.push(path.to_path_buf());
    }

    if merged.sources.is_empty() {
        return Ok(None);
    }
    Ok(Some(merged))
}

async fn read_configuration_file(path: &Path) -> Result<Map<String, Value>> {
    let text = read_legacy_text(path).await?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Map::new());
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ModbayError::parse(
            path,
            "configuration must be a JSON object",
        )),
        Err(json_err) => {
            let mut map = Map::new();
            let mut invalid = 0usize;
            for line in ini_lines(trimmed) {
                match line {
                    IniLine::Pair(key, value) => {
                        map.insert(key, Value::String(value));
                    }
                    IniLine::Invalid(_) => invalid += 1,
                }
            }
            if map.is_empty() {
                return Err(ModbayError::parse(path, json_err.to_string()));
            }
            if invalid > 0 {
                warn!(
                    "Ignored {} malformed lines in {}",
                    invalid,
                    path.display()
                );
            }
            Ok(map)
        }
    }
}

/// Merge `overlay` into `base`; nested objects merge key by key.
pub fn merge_values(base: &mut Map<String, Value>, overlay: Map<String, Value>) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_values(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
