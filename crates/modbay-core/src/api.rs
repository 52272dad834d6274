//! Facade over the stores and the migration manager of one data root.

use crate::catalog::{ModCatalog, ModCatalogEntry, SqliteModCatalog};
use crate::classification::{
    find_node, move_mod, ClassificationNode, ClassificationStore, SqliteClassificationStore,
};
use crate::config::{LegacyLayout, MigrationConfig, PathsConfig};
use crate::db::Database;
use crate::error::{ModbayError, Result};
use crate::files::{DefaultImageService, LocalFileService};
use crate::migration::{
    self, ArchiveValidation, MigrationManager, MigrationOptions, MigrationProgress,
    MigrationRecord, MigrationResult, MigrationServices, Migrator, SourceAnalysis,
};
use crate::settings::SettingsStore;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;

/// Entry point for embedding Modbay.
pub struct ModbayApi {
    data_root: PathBuf,
    classifications: Arc<SqliteClassificationStore>,
    catalog: Arc<SqliteModCatalog>,
    migrations: MigrationManager,
    /// Serializes category moves against the same tree.
    category_lock: Mutex<()>,
}

impl ModbayApi {
    /// Open (or create) the data root and its database.
    pub fn new(data_root: impl Into<PathBuf>) -> Result<Self> {
        let data_root = data_root.into();
        let db = Database::open(PathsConfig::database_path(&data_root))?;
        let classifications = Arc::new(SqliteClassificationStore::new(db.clone()));
        let catalog = Arc::new(SqliteModCatalog::new(db));

        let services = MigrationServices {
            classifications: classifications.clone(),
            catalog: catalog.clone(),
            files: Arc::new(LocalFileService::new()),
            images: Arc::new(DefaultImageService),
            settings: SettingsStore::new(&data_root),
        };
        let migrator = Arc::new(Migrator::new(&data_root, services));

        info!("Modbay data root: {}", data_root.display());
        Ok(Self {
            data_root,
            classifications,
            catalog,
            migrations: MigrationManager::new(migrator),
            category_lock: Mutex::new(()),
        })
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    // ========================================
    // Migration
    // ========================================

    /// Inventory a legacy installation without changing anything.
    pub async fn analyze_source(
        &self,
        source: impl Into<PathBuf>,
        environment: Option<&str>,
    ) -> Result<SourceAnalysis> {
        let layout = LegacyLayout::new(
            source,
            environment.unwrap_or(MigrationConfig::DEFAULT_ENVIRONMENT),
        );
        migration::analyze_source(&layout).await
    }

    /// Start a background migration and return its id.
    pub fn start_migration(&self, options: MigrationOptions) -> Result<String> {
        self.migrations.start(options)
    }

    /// Run a migration to completion and return its result.
    ///
    /// The run is registered like one started with [`Self::start_migration`],
    /// so it blocks other migrations and category moves while it lasts.
    pub async fn migrate(&self, options: MigrationOptions) -> Result<MigrationResult> {
        self.migrations.run(options).await
    }

    pub fn get_migration(&self, migration_id: &str) -> Result<MigrationRecord> {
        self.migrations.get(migration_id)
    }

    pub fn get_migration_progress(&self, migration_id: &str) -> Result<Option<MigrationProgress>> {
        Ok(self.migrations.get(migration_id)?.progress)
    }

    /// Final result, or `None` while the run is still going.
    pub fn get_migration_result(&self, migration_id: &str) -> Result<Option<MigrationResult>> {
        Ok(self.migrations.get(migration_id)?.result)
    }

    pub async fn wait_for_migration(&self, migration_id: &str) -> Result<MigrationRecord> {
        self.migrations.wait(migration_id).await
    }

    pub fn cancel_migration(&self, migration_id: &str) -> Result<()> {
        self.migrations.cancel(migration_id)
    }

    pub fn list_migrations(&self) -> Vec<MigrationRecord> {
        self.migrations.list()
    }

    // ========================================
    // Classification
    // ========================================

    pub fn classification_tree(&self) -> Result<Vec<ClassificationNode>> {
        self.classifications.load_tree()
    }

    /// Move a mod to another category, keeping node counts consistent.
    ///
    /// Returns the updated tree.
    pub fn move_mod_category(&self, sha: &str, new_category: &str) -> Result<Vec<ClassificationNode>> {
        if let Some(active) = self.migrations.active() {
            return Err(ModbayError::MigrationInProgress {
                migration_id: active,
            });
        }
        let _guard = self.category_lock.lock().expect("category lock poisoned");

        let tree = self.classifications.load_tree()?;
        if !new_category.is_empty() && find_node(&tree, new_category).is_none() {
            return Err(ModbayError::Validation {
                field: "category".to_string(),
                message: format!("classification {} does not exist", new_category),
            });
        }

        let mods = self.catalog.list_all()?;
        let (new_tree, new_mods) = move_mod(&tree, &mods, sha, new_category)?;
        if let Some(entry) = new_mods.iter().find(|m| m.sha == sha) {
            self.catalog.update(entry)?;
        }
        self.classifications.save_counts(&new_tree)?;
        Ok(new_tree)
    }

    /// Every catalog entry in insertion order.
    pub fn list_mods(&self) -> Result<Vec<ModCatalogEntry>> {
        self.catalog.list_all()
    }

    // ========================================
    // Validation
    // ========================================

    pub fn validate_archives(&self) -> Result<ArchiveValidation> {
        migration::validate_archives(
            &PathsConfig::archives_dir(&self.data_root),
            self.catalog.as_ref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::NewNode;
    use crate::files::ArchiveFormat;
    use tempfile::TempDir;

    fn seeded(temp: &TempDir) -> ModbayApi {
        let api = ModbayApi::new(temp.path().join("data")).unwrap();
        for node in [
            NewNode::named("fire", None, 100),
            NewNode::named("lw", Some("fire".into()), 50),
            NewNode::named("ice", None, 100),
        ] {
            api.classifications.create_node(&node).unwrap();
        }
        let entry = ModCatalogEntry {
            category: "lw".into(),
            ..ModCatalogEntry::bare("aaa", ArchiveFormat::Zip)
        };
        api.catalog.insert(&entry).unwrap();
        let tree = crate::classification::recompute_counts(
            &api.classification_tree().unwrap(),
            &api.catalog.list_all().unwrap(),
        );
        api.classifications.save_counts(&tree).unwrap();
        api
    }

    #[test]
    fn test_move_mod_category_persists() {
        let temp = TempDir::new().unwrap();
        let api = seeded(&temp);

        api.move_mod_category("aaa", "ice").unwrap();

        let tree = api.classification_tree().unwrap();
        assert_eq!(find_node(&tree, "lw").unwrap().mod_count, 0);
        assert_eq!(find_node(&tree, "ice").unwrap().mod_count, 1);
        assert_eq!(api.catalog.get_by_hash("aaa").unwrap().unwrap().category, "ice");
    }

    #[test]
    fn test_move_to_ancestor_keeps_ancestor_count() {
        let temp = TempDir::new().unwrap();
        let api = seeded(&temp);

        let tree = api.move_mod_category("aaa", "fire").unwrap();
        assert_eq!(find_node(&tree, "fire").unwrap().mod_count, 1);
        assert_eq!(find_node(&tree, "lw").unwrap().mod_count, 0);
    }

    #[test]
    fn test_move_to_unknown_category_is_rejected() {
        let temp = TempDir::new().unwrap();
        let api = seeded(&temp);
        assert!(matches!(
            api.move_mod_category("aaa", "nowhere"),
            Err(ModbayError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_blocking_migrate_is_tracked() {
        let temp = TempDir::new().unwrap();
        let api = ModbayApi::new(temp.path().join("data")).unwrap();

        let result = api
            .migrate(MigrationOptions::new(temp.path().join("missing")))
            .await
            .unwrap();

        assert!(!result.success);
        let runs = api.list_migrations();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].result.as_ref(), Some(&result));
    }

    #[test]
    fn test_validate_archives_on_empty_root() {
        let temp = TempDir::new().unwrap();
        let api = ModbayApi::new(temp.path().join("data")).unwrap();
        assert!(api.validate_archives().unwrap().is_consistent());
    }
}
