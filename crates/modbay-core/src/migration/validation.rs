//! Cross-check between stored archives and catalog entries.

use super::types::ArchiveValidation;
use crate::catalog::ModCatalog;
use crate::error::{ModbayError, Result};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::warn;

/// Compare the files in `archive_dir` with the catalog's hash set.
///
/// A missing archive directory counts as empty. Dotfiles (staged copies)
/// are not archives.
pub fn validate_archives(archive_dir: &Path, catalog: &dyn ModCatalog) -> Result<ArchiveValidation> {
    let mut on_disk = BTreeSet::new();
    if archive_dir.is_dir() {
        let entries =
            std::fs::read_dir(archive_dir).map_err(|e| ModbayError::io_with_path(e, archive_dir))?;
        for entry in entries {
            let entry = entry.map_err(|e| ModbayError::io_with_path(e, archive_dir))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if entry.path().is_file() && !name.starts_with('.') {
                on_disk.insert(name);
            }
        }
    }

    let cataloged: BTreeSet<String> = catalog.list_hashes()?.into_iter().collect();

    let validation = ArchiveValidation {
        archives_without_entry: on_disk.difference(&cataloged).cloned().collect(),
        entries_without_archive: cataloged.difference(&on_disk).cloned().collect(),
    };

    if !validation.is_consistent() {
        warn!(
            "Archive validation: {} archives without entry, {} entries without archive",
            validation.archives_without_entry.len(),
            validation.entries_without_archive.len()
        );
    }
    Ok(validation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ModCatalogEntry, SqliteModCatalog};
    use crate::db::Database;
    use crate::files::ArchiveFormat;
    use tempfile::TempDir;

    #[test]
    fn test_reports_both_directions() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a"), b"x").unwrap();
        std::fs::write(temp.path().join("b"), b"x").unwrap();
        std::fs::write(temp.path().join(".a.42.part"), b"x").unwrap();

        let catalog = SqliteModCatalog::new(Database::open_in_memory().unwrap());
        catalog.insert(&ModCatalogEntry::bare("a", ArchiveFormat::Zip)).unwrap();
        catalog.insert(&ModCatalogEntry::bare("c", ArchiveFormat::Zip)).unwrap();

        let validation = validate_archives(temp.path(), &catalog).unwrap();
        assert_eq!(validation.archives_without_entry, vec!["b"]);
        assert_eq!(validation.entries_without_archive, vec!["c"]);
        assert!(!validation.is_consistent());
    }

    #[test]
    fn test_missing_directory_and_empty_catalog_is_consistent() {
        let temp = TempDir::new().unwrap();
        let catalog = SqliteModCatalog::new(Database::open_in_memory().unwrap());
        let validation = validate_archives(&temp.path().join("archives"), &catalog).unwrap();
        assert!(validation.is_consistent());
    }
}
