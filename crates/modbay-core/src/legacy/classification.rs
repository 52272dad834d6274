//! Classification directory parser.
//!
//! The legacy tool stores a two-level tree as flat files: the file name is
//! the category and each non-blank line is an object of that category.
//! The parser keeps that shape as an ordered map-of-lists and leaves the
//! hierarchy decisions to the tree builder.

use super::read_legacy_text;
use crate::config::LegacyLayout;
use crate::error::{ModbayError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Objects listed in one category file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryObjects {
    pub category: String,
    pub objects: Vec<String>,
}

/// Ordered category -> objects mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationMapping {
    pub categories: Vec<CategoryObjects>,
    /// Category files that could not be read, with the reason.
    pub failed_files: Vec<(PathBuf, String)>,
}

impl ClassificationMapping {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Number of category files parsed.
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// Total number of object lines across all categories.
    pub fn object_count(&self) -> usize {
        self.categories.iter().map(|c| c.objects.len()).sum()
    }

    pub fn get(&self, category: &str) -> Option<&[String]> {
        self.categories
            .iter()
            .find(|c| c.category == category)
            .map(|c| c.objects.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = &CategoryObjects> {
        self.categories.iter()
    }
}

/// Parse a classification directory.
///
/// Category files are visited in file-name order. The redirection ini and
/// dotfiles are not categories. A missing directory yields an empty mapping.
pub async fn parse_classifications(dir: &Path) -> Result<ClassificationMapping> {
    if !dir.exists() {
        debug!("No classification directory at {}", dir.display());
        return Ok(ClassificationMapping::default());
    }
    if !dir.is_dir() {
        return Err(ModbayError::NotADirectory(dir.to_path_buf()));
    }

    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ModbayError::io_with_path(e, dir))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ModbayError::io_with_path(e, dir))?
    {
        let file_type = match entry.file_type().await {
            Ok(ft) => ft,
            Err(e) => {
                warn!("Skipping {}: {}", entry.path().display(), e);
                continue;
            }
        };
        if !file_type.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name == LegacyLayout::REDIRECTION_FILENAME || name.starts_with('.') {
            continue;
        }
        files.push((name, entry.path()));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut mapping = ClassificationMapping::default();
    for (category, path) in files {
        match read_legacy_text(&path).await {
            Ok(text) => {
                let objects: Vec<String> = text
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(String::from)
                    .collect();
                debug!("Category {}: {} objects", category, objects.len());
                mapping.categories.push(CategoryObjects { category, objects });
            }
            Err(e) => {
                warn!("Failed to read category file {}: {}", path.display(), e);
                mapping.failed_files.push((path, e.to_string()));
            }
        }
    }

    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let temp = TempDir::new().unwrap();
        let mapping = parse_classifications(&temp.path().join("nope"))
            .await
            .unwrap();
        assert!(mapping.is_empty());
        assert_eq!(mapping.object_count(), 0);
    }

    #[tokio::test]
    async fn test_file_instead_of_directory_fails() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("classification");
        std::fs::write(&file, "x").unwrap();
        assert!(matches!(
            parse_classifications(&file).await,
            Err(ModbayError::NotADirectory(_))
        ));
    }

    #[tokio::test]
    async fn test_blank_lines_skipped_and_trimmed() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("干员·灼热"),
            "  莱万汀  \n\n   \n伊芙利特\r\n",
        )
        .unwrap();
        std::fs::write(temp.path().join("干员·寒冷"), "冰雪\n霜降\n").unwrap();
        std::fs::write(temp.path().join("_redirection.ini"), "a = b").unwrap();

        let mapping = parse_classifications(temp.path()).await.unwrap();
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.object_count(), 4);
        assert_eq!(
            mapping.get("干员·灼热").unwrap(),
            &["莱万汀".to_string(), "伊芙利特".to_string()]
        );
        assert_eq!(
            mapping.get("干员·寒冷").unwrap(),
            &["冰雪".to_string(), "霜降".to_string()]
        );
        assert!(mapping.get("_redirection.ini").is_none());
    }

    #[tokio::test]
    async fn test_categories_in_file_name_order() {
        let temp = TempDir::new().unwrap();
        for name in ["c", "a", "b"] {
            std::fs::write(temp.path().join(name), "obj").unwrap();
        }
        let mapping = parse_classifications(temp.path()).await.unwrap();
        let order: Vec<&str> = mapping.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_underscore_category_kept() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("_misc"), "odds\nends\n").unwrap();
        std::fs::write(temp.path().join("_redirection.ini"), "a = b").unwrap();
        std::fs::write(temp.path().join(".DS_Store"), "junk").unwrap();

        let mapping = parse_classifications(temp.path()).await.unwrap();
        assert_eq!(mapping.len(), 1);
        assert_eq!(
            mapping.get("_misc").unwrap(),
            &["odds".to_string(), "ends".to_string()]
        );
    }

    #[tokio::test]
    async fn test_empty_category_file_kept() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("empty"), "\n\n").unwrap();
        let mapping = parse_classifications(temp.path()).await.unwrap();
        assert_eq!(mapping.len(), 1);
        assert!(mapping.get("empty").unwrap().is_empty());
    }
}
