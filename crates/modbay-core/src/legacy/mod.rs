//! Readers for the on-disk formats of the legacy installation.
//!
//! Every parser is stateless and only reads. A missing input is treated as
//! "nothing to migrate" and yields an empty result; malformed input is a
//! [`ModbayError::Parse`](crate::ModbayError::Parse), isolated per file
//! wherever the format is split over several files.

mod classification;
mod configuration;
mod mod_index;
mod redirection;

pub use classification::{parse_classifications, CategoryObjects, ClassificationMapping};
pub use configuration::{merge_values, parse_configuration, LegacyConfiguration};
pub use mod_index::{
    is_index_shard, parse_mod_index, parse_mod_index_shard, LegacyModRecord, ModIndex,
    ModIndexStats,
};
pub use redirection::{parse_redirection, RedirectionEntry, RedirectionMapping, RedirectionStats};

use crate::error::{ModbayError, Result};
use std::path::Path;

/// One line of an INI-like file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum IniLine {
    /// `key = value` with both sides non-empty.
    Pair(String, String),
    /// A line that is neither blank, a comment, a section, nor a valid pair.
    Invalid(String),
}

/// Split INI-like text into key/value lines.
///
/// Blank lines, `;`/`#` comments and `[section]` headers are dropped.
/// Surrounding quotes on values are stripped.
pub(crate) fn ini_lines(text: &str) -> Vec<IniLine> {
    let mut lines = Vec::new();

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            continue;
        }

        match line.split_once('=') {
            Some((key, value)) => {
                let key = key.trim();
                let value = strip_quotes(value.trim());
                if key.is_empty() || value.is_empty() {
                    lines.push(IniLine::Invalid(line.to_string()));
                } else {
                    lines.push(IniLine::Pair(key.to_string(), value.to_string()));
                }
            }
            None => lines.push(IniLine::Invalid(line.to_string())),
        }
    }

    lines
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Read a legacy text file, tolerating a UTF-8 BOM and stray invalid bytes.
pub(crate) async fn read_legacy_text(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ModbayError::io_with_path(e, path))?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text.trim_start_matches('\u{feff}').to_string())
}
