//! Mod index parser.
//!
//! The legacy catalog is split into JSON shards (`index_2023-11.json`,
//! `index_2023-12.json`, ...). Each shard holds either an array of records
//! or an object keyed by hash. A broken shard is reported in the stats and
//! skipped; the remaining shards are still parsed.

use super::read_legacy_text;
use crate::error::{ModbayError, Result};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Shard file names: `index_<anything>.json`.
static SHARD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^index_.+\.json$").expect("valid shard pattern"));

/// One mod as described by the legacy index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyModRecord {
    #[serde(default, alias = "sha")]
    pub hash: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub grading: Option<String>,
    #[serde(default, alias = "explain")]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl LegacyModRecord {
    /// Display name, falling back to the hash.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or(self.hash.as_deref())
            .unwrap_or("<unnamed>")
    }
}

/// Tags appear either as a list or as one comma-separated string.
fn deserialize_tags<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Tags {
        List(Vec<String>),
        Joined(String),
        Missing(Option<()>),
    }

    let tags = match Tags::deserialize(deserializer)? {
        Tags::List(list) => list,
        Tags::Joined(joined) => joined.split(',').map(String::from).collect(),
        Tags::Missing(_) => Vec::new(),
    };

    Ok(tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect())
}

/// Per-shard parse statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModIndexStats {
    pub shards_total: usize,
    pub shards_failed: usize,
    pub records_total: usize,
    /// Records without a hash; they cannot be matched to an archive.
    pub records_invalid: usize,
    pub failed_shards: Vec<(PathBuf, String)>,
}

/// Flattened index across all shards, in shard then record order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModIndex {
    pub entries: Vec<LegacyModRecord>,
    pub stats: ModIndexStats,
}

impl ModIndex {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Check whether a file name looks like an index shard.
pub fn is_index_shard(file_name: &str) -> bool {
    SHARD_PATTERN.is_match(file_name)
}

/// Parse every shard in the index directory.
///
/// A missing directory yields an empty index.
pub async fn parse_mod_index(dir: &Path) -> Result<ModIndex> {
    let mut index = ModIndex::default();
    if !dir.exists() {
        debug!("No mod index directory at {}", dir.display());
        return Ok(index);
    }
    if !dir.is_dir() {
        return Err(ModbayError::NotADirectory(dir.to_path_buf()));
    }

    let shards = list_shards(dir).await?;
    for shard in shards {
        index.stats.shards_total += 1;
        match parse_mod_index_shard(&shard).await {
            Ok(records) => {
                index.stats.records_total += records.len();
                for record in records {
                    if record.hash.as_deref().map(str::trim).unwrap_or("").is_empty() {
                        index.stats.records_invalid += 1;
                        continue;
                    }
                    index.entries.push(record);
                }
            }
            Err(e) => {
                warn!("Skipping mod index shard {}: {}", shard.display(), e);
                index.stats.shards_failed += 1;
                index.stats.failed_shards.push((shard, e.to_string()));
            }
        }
    }

    debug!(
        "Mod index {}: {} entries from {} shards ({} failed)",
        dir.display(),
        index.entries.len(),
        index.stats.shards_total,
        index.stats.shards_failed
    );

    Ok(index)
}

async fn list_shards(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut shards = Vec::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ModbayError::io_with_path(e, dir))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ModbayError::io_with_path(e, dir))?
    {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if path.is_file() && is_index_shard(&name) {
            shards.push(path);
        }
    }
    shards.sort();
    Ok(shards)
}

/// Parse a single shard file.
pub async fn parse_mod_index_shard(path: &Path) -> Result<Vec<LegacyModRecord>> {
    let text = read_legacy_text(path).await?;
    let value: Value = serde_json::from_str(&text)
        .map_err(|e| ModbayError::parse(path, e.to_string()))?;

    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| {
                serde_json::from_value(item).map_err(|e| ModbayError::parse(path, e.to_string()))
            })
            .collect(),
        // Keyed shards keep file order (serde_json `preserve_order`).
        Value::Object(map) => map
            .into_iter()
            .map(|(key, item)| {
                let mut record: LegacyModRecord = serde_json::from_value(item)
                    .map_err(|e| ModbayError::parse(path, e.to_string()))?;
                if record.hash.is_none() {
                    record.hash = Some(key);
                }
                Ok(record)
            })
            .collect(),
        other => Err(ModbayError::parse(
            path,
            format!("expected an array or object of mod records, found {}", kind(&other)),
        )),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
