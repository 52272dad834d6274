//! Background migration jobs.
//!
//! At most one migration runs at a time. Each run gets a uuid, executes on
//! a spawned tokio task and reports through the progress tracker.

use super::orchestrator::Migrator;
use super::progress::{
    MigrationProgressTracker, MigrationRecord, MigrationStatus, ProgressCallback,
};
use super::types::{MigrationOptions, MigrationProgress, MigrationResult};
use crate::cancel::CancellationToken;
use crate::config::LegacyLayout;
use crate::error::{ModbayError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{error, info};

pub struct MigrationManager {
    migrator: Arc<Migrator>,
    progress: Arc<MigrationProgressTracker>,
    cancel_tokens: Mutex<HashMap<String, CancellationToken>>,
}

impl MigrationManager {
    pub fn new(migrator: Arc<Migrator>) -> Self {
        Self {
            migrator,
            progress: Arc::new(MigrationProgressTracker::new()),
            cancel_tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Validate the source and start a migration in the background.
    ///
    /// Returns the migration id used for progress queries and cancellation.
    pub fn start(&self, options: MigrationOptions) -> Result<String> {
        Migrator::check_source(&LegacyLayout::new(
            &options.source_path,
            &options.environment_name,
        ))?;
        self.launch(options)
    }

    /// Run a migration to completion, registered like a background one.
    ///
    /// A structural failure is part of the returned result, not an `Err`.
    pub async fn run(&self, options: MigrationOptions) -> Result<MigrationResult> {
        let migration_id = self.launch(options)?;
        let record = self.wait(&migration_id).await?;
        record.result.ok_or_else(|| {
            ModbayError::Other(
                record
                    .error
                    .unwrap_or_else(|| format!("Migration {} produced no result", migration_id)),
            )
        })
    }

    /// Register a run with the tracker and spawn it.
    fn launch(&self, options: MigrationOptions) -> Result<String> {
        let migration_id = uuid::Uuid::new_v4().to_string();
        self.progress.begin(&migration_id)?;

        let cancel_token = CancellationToken::new();
        {
            let mut tokens = self.cancel_tokens.lock().expect("cancel_tokens lock poisoned");
            tokens.retain(|id, _| {
                self.progress
                    .get(id)
                    .is_some_and(|r| r.status == MigrationStatus::Running)
            });
            tokens.insert(migration_id.clone(), cancel_token.clone());
        }

        let id = migration_id.clone();
        let migrator = self.migrator.clone();
        let tracker = self.progress.clone();
        let callback_tracker = self.progress.clone();
        let callback_id = migration_id.clone();
        let on_progress: ProgressCallback = Arc::new(move |progress: &MigrationProgress| {
            callback_tracker.update_progress(&callback_id, progress);
        });

        info!("Starting migration {} from {}", id, options.source_path.display());
        tokio::spawn(async move {
            let run = tokio::spawn(async move {
                migrator
                    .migrate_with(options, cancel_token, Some(on_progress))
                    .await
            });
            match run.await {
                Ok(result) => tracker.complete(&id, result),
                Err(e) => {
                    error!("Migration {} aborted: {}", id, e);
                    tracker.set_error(&id, e.to_string());
                }
            }
        });

        Ok(migration_id)
    }

    /// Request cancellation; takes effect before the next item.
    pub fn cancel(&self, migration_id: &str) -> Result<()> {
        let tokens = self.cancel_tokens.lock().expect("cancel_tokens lock poisoned");
        match tokens.get(migration_id) {
            Some(token) => {
                token.cancel();
                info!("Cancellation requested for migration {}", migration_id);
                Ok(())
            }
            None if self.progress.get(migration_id).is_some() => Ok(()),
            None => Err(ModbayError::MigrationNotFound {
                migration_id: migration_id.to_string(),
            }),
        }
    }

    pub fn get(&self, migration_id: &str) -> Result<MigrationRecord> {
        self.progress
            .get(migration_id)
            .ok_or_else(|| ModbayError::MigrationNotFound {
                migration_id: migration_id.to_string(),
            })
    }

    pub fn list(&self) -> Vec<MigrationRecord> {
        self.progress.list_all()
    }

    /// Id of the running migration, if any.
    pub fn active(&self) -> Option<String> {
        self.progress.active()
    }

    /// Poll until the run leaves the running state.
    pub async fn wait(&self, migration_id: &str) -> Result<MigrationRecord> {
        loop {
            let record = self.get(migration_id)?;
            if record.status != MigrationStatus::Running {
                return Ok(record);
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::context::fixtures::{legacy_source, services, write_file};
    use crate::migration::context::MigrationContext;
    use crate::migration::steps::MigrationStep;
    use crate::migration::types::{MigrationStage, StepOutcome};
    use tempfile::TempDir;

    fn manager(temp: &TempDir) -> MigrationManager {
        let data = temp.path().join("data");
        MigrationManager::new(Arc::new(Migrator::new(&data, services(&data))))
    }

    #[tokio::test]
    async fn test_start_and_wait() {
        let temp = TempDir::new().unwrap();
        let source = legacy_source(temp.path());
        write_file(
            &LegacyLayout::new(&source, "default")
                .classification_dir()
                .join("fire"),
            "lw\n",
        );
        let manager = manager(&temp);

        let id = manager.start(MigrationOptions::new(&source)).unwrap();
        let record = manager.wait(&id).await.unwrap();

        assert_eq!(record.status, MigrationStatus::Completed);
        let result = record.result.unwrap();
        assert_eq!(result.classification_rules_created, 2);
        assert_eq!(manager.list().len(), 1);
    }

    struct GateStep(Arc<tokio::sync::Notify>);

    #[async_trait::async_trait]
    impl MigrationStep for GateStep {
        fn stage(&self) -> MigrationStage {
            MigrationStage::AnalyzeSource
        }

        fn is_enabled(&self, _options: &MigrationOptions) -> bool {
            true
        }

        async fn run(&self, _ctx: &mut MigrationContext) -> Result<StepOutcome> {
            self.0.notified().await;
            Ok(StepOutcome::default())
        }
    }

    #[tokio::test]
    async fn test_run_blocks_other_migrations() {
        let temp = TempDir::new().unwrap();
        let source = legacy_source(temp.path());
        let data = temp.path().join("data");
        let gate = Arc::new(tokio::sync::Notify::new());
        let steps: Vec<Box<dyn MigrationStep>> = vec![Box::new(GateStep(gate.clone()))];
        let migrator = Migrator::new(&data, services(&data)).with_steps(steps);
        let manager = Arc::new(MigrationManager::new(Arc::new(migrator)));

        let running = {
            let manager = manager.clone();
            let options = MigrationOptions::new(&source);
            tokio::spawn(async move { manager.run(options).await })
        };
        while manager.active().is_none() {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        assert!(matches!(
            manager.start(MigrationOptions::new(&source)),
            Err(ModbayError::MigrationInProgress { .. })
        ));
        assert!(matches!(
            manager.run(MigrationOptions::new(&source)).await,
            Err(ModbayError::MigrationInProgress { .. })
        ));

        gate.notify_one();
        let result = running.await.unwrap().unwrap();
        assert!(result.success);
        assert!(manager.active().is_none());
        assert_eq!(manager.list().len(), 1);
    }

    #[tokio::test]
    async fn test_run_reports_structural_failure_as_result() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);

        let result = manager
            .run(MigrationOptions::new(temp.path().join("missing")))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(manager.list()[0].status, MigrationStatus::Failed);
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_source() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);
        assert!(matches!(
            manager.start(MigrationOptions::new(temp.path().join("missing"))),
            Err(ModbayError::InvalidSource { .. })
        ));
        assert!(manager.list().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_migration() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);
        assert!(matches!(
            manager.get("nope"),
            Err(ModbayError::MigrationNotFound { .. })
        ));
        assert!(manager.cancel("nope").is_err());
    }
}
