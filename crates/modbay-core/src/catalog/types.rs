//! Mod catalog entry.

use crate::files::ArchiveFormat;
use serde::{Deserialize, Serialize};

/// One managed mod, keyed by the content hash of its archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModCatalogEntry {
    pub sha: String,
    pub name: String,
    #[serde(default)]
    pub author: Option<String>,
    /// Expected to equal a classification node id once linked.
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub grading: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub format: ArchiveFormat,
    /// Preview image inside the data root.
    #[serde(default)]
    pub preview: Option<String>,
    pub added_at: String,
}

impl ModCatalogEntry {
    /// Minimal entry for an archive with no known metadata.
    pub fn bare(sha: impl Into<String>, format: ArchiveFormat) -> Self {
        let sha = sha.into();
        Self {
            name: sha.clone(),
            sha,
            author: None,
            category: String::new(),
            tags: Vec::new(),
            grading: None,
            description: None,
            format,
            preview: None,
            added_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
