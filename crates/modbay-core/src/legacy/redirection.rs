//! `_redirection.ini` parser: classification name -> thumbnail image.

use super::{ini_lines, read_legacy_text, IniLine};
use crate::error::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A single name -> thumbnail mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectionEntry {
    pub name: String,
    pub path: String,
}

/// Line statistics for a redirection file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectionStats {
    /// Non-blank, non-comment, non-section lines.
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    /// Valid lines whose name was already mapped (first one wins).
    pub duplicates: usize,
}

/// Ordered redirection mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectionMapping {
    pub entries: Vec<RedirectionEntry>,
    pub stats: RedirectionStats,
    /// Directory relative paths are resolved against.
    pub base_dir: Option<PathBuf>,
}

impl RedirectionMapping {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.path.as_str())
    }

    /// Resolve an entry's image path on disk.
    pub fn resolve(&self, entry: &RedirectionEntry) -> PathBuf {
        let path = PathBuf::from(entry.path.replace('\\', "/"));
        match (&self.base_dir, path.is_absolute()) {
            (Some(base), false) => base.join(path),
            _ => path,
        }
    }
}

/// Parse a redirection file. A missing file yields an empty mapping.
pub async fn parse_redirection(path: &Path) -> Result<RedirectionMapping> {
    if !path.is_file() {
        debug!("No redirection file at {}", path.display());
        return Ok(RedirectionMapping::default());
    }

    let text = read_legacy_text(path).await?;
    let mut mapping = RedirectionMapping {
        base_dir: path.parent().map(Path::to_path_buf),
        ..Default::default()
    };

    for line in ini_lines(&text) {
        mapping.stats.total += 1;
        match line {
            IniLine::Pair(name, image) => {
                mapping.stats.valid += 1;
                if mapping.get(&name).is_some() {
                    mapping.stats.duplicates += 1;
                    continue;
                }
                mapping.entries.push(RedirectionEntry { name, path: image });
            }
            IniLine::Invalid(raw) => {
                warn!("Invalid redirection line in {}: {}", path.display(), raw);
                mapping.stats.invalid += 1;
            }
        }
    }

    debug!(
        "Redirection {}: {} entries ({} invalid, {} duplicates)",
        path.display(),
        mapping.entries.len(),
        mapping.stats.invalid,
        mapping.stats.duplicates
    );

    Ok(mapping)
}
