//! Runs the migration steps in their fixed order.

use super::context::{MigrationContext, MigrationServices};
use super::progress::ProgressCallback;
use super::steps::{default_steps, MigrationStep};
use super::types::{MigrationOptions, MigrationResult, MigrationStage, StepReport, StepStatus};
use super::validation::validate_archives;
use crate::cancel::CancellationToken;
use crate::classification::recompute_counts;
use crate::config::LegacyLayout;
use crate::error::{ModbayError, Result};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Executes a migration run against one data root.
pub struct Migrator {
    data_root: PathBuf,
    services: MigrationServices,
    steps: Vec<Box<dyn MigrationStep>>,
}

impl Migrator {
    pub fn new(data_root: impl Into<PathBuf>, services: MigrationServices) -> Self {
        Self {
            data_root: data_root.into(),
            services,
            steps: default_steps(),
        }
    }

    /// Replace the step list; used to inject failing steps in tests.
    pub fn with_steps(mut self, steps: Vec<Box<dyn MigrationStep>>) -> Self {
        self.steps = steps;
        self
    }

    pub fn services(&self) -> &MigrationServices {
        &self.services
    }

    /// Structural check: the source, its `resources/` and `home/{env}/` must exist.
    pub fn check_source(layout: &LegacyLayout) -> Result<()> {
        let required = [
            (layout.source().to_path_buf(), "source directory does not exist"),
            (layout.resources_dir(), "resources directory is missing"),
            (layout.environment_dir(), "environment directory is missing"),
        ];
        for (path, reason) in required {
            if !path.is_dir() {
                return Err(ModbayError::InvalidSource {
                    path,
                    reason: reason.to_string(),
                });
            }
        }
        Ok(())
    }

    pub async fn migrate(&self, options: MigrationOptions) -> MigrationResult {
        self.migrate_with(options, CancellationToken::new(), None)
            .await
    }

    /// Run every step, isolating failures per step.
    ///
    /// Only a structural failure stops the run before the first step.
    pub async fn migrate_with(
        &self,
        options: MigrationOptions,
        cancel: CancellationToken,
        on_progress: Option<ProgressCallback>,
    ) -> MigrationResult {
        let mut ctx = MigrationContext::new(
            options,
            &self.data_root,
            self.services.clone(),
            cancel,
            on_progress,
        );

        if let Err(e) = Self::check_source(&ctx.layout) {
            error!("Migration aborted: {}", e);
            ctx.record_error(ctx.layout.source().display().to_string(), e.to_string());
            return Self::finish(ctx, false);
        }

        info!(
            "Starting migration from {} (environment {})",
            ctx.layout.source().display(),
            ctx.layout.environment()
        );

        let mut failed: HashSet<MigrationStage> = HashSet::new();
        let mut archives_ran = false;
        let mut cancelled = false;

        for step in &self.steps {
            if ctx.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let stage = step.stage();
            ctx.enter_stage(stage);

            if !step.is_enabled(&ctx.options) {
                info!("{}: skipped by options", stage);
                ctx.result.step_reports.push(StepReport {
                    stage,
                    status: StepStatus::Skipped,
                    items_processed: 0,
                    error: None,
                });
                continue;
            }

            if let Some(dependency) = step.depends_on().iter().find(|d| failed.contains(*d)) {
                warn!("{}: {} failed, running as no-op", stage, dependency);
                ctx.result.step_reports.push(StepReport {
                    stage,
                    status: StepStatus::Degraded,
                    items_processed: 0,
                    error: Some(format!("{} failed", dependency)),
                });
                continue;
            }

            if stage == MigrationStage::MigrateModArchives {
                archives_ran = true;
            }

            match step.run(&mut ctx).await {
                Ok(outcome) => {
                    ctx.result.step_reports.push(StepReport {
                        stage,
                        status: StepStatus::Completed,
                        items_processed: outcome.items_processed,
                        error: None,
                    });
                }
                Err(ModbayError::MigrationCancelled) => {
                    info!("{}: cancelled", stage);
                    cancelled = true;
                    break;
                }
                Err(e) => {
                    error!("{} failed: {}", stage, e);
                    failed.insert(stage);
                    ctx.record_error(stage.label(), e.to_string());
                    ctx.result.step_reports.push(StepReport {
                        stage,
                        status: StepStatus::Failed,
                        items_processed: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        self.finalize(&mut ctx, archives_ran);

        ctx.result.cancelled = cancelled;
        let success = !cancelled && failed.is_empty();
        Self::finish(ctx, success)
    }

    /// Recompute node counts from the catalog and cross-check archives.
    fn finalize(&self, ctx: &mut MigrationContext, archives_ran: bool) {
        let counted = self
            .services
            .classifications
            .load_tree()
            .and_then(|tree| {
                let mods = self.services.catalog.list_all()?;
                let tree = recompute_counts(&tree, &mods);
                self.services.classifications.save_counts(&tree)
            });
        if let Err(e) = counted {
            ctx.record_error("classification counts", e.to_string());
        }

        if archives_ran {
            match validate_archives(&ctx.archives_dir(), &*self.services.catalog) {
                Ok(validation) => ctx.result.validation = Some(validation),
                Err(e) => ctx.record_error("archive validation", e.to_string()),
            }
        }
    }

    fn finish(mut ctx: MigrationContext, success: bool) -> MigrationResult {
        ctx.result.success = success;
        ctx.result.finished_at = Some(chrono::Utc::now().to_rfc3339());
        ctx.enter_stage(MigrationStage::Done);

        let result = ctx.result;
        info!(
            "Migration {}: {} rules, {} mods, {} archives, {} previews, {} errors",
            if result.success { "complete" } else { "failed" },
            result.classification_rules_created,
            result.mods_migrated,
            result.archives_copied,
            result.previews_copied,
            result.errors.len()
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::context::fixtures::{legacy_source, services, write_file, ZIP_BYTES};
    use crate::migration::types::{MigrationProgress, StepOutcome};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    struct FailingStep(MigrationStage);

    #[async_trait]
    impl MigrationStep for FailingStep {
        fn stage(&self) -> MigrationStage {
            self.0
        }

        fn is_enabled(&self, _options: &MigrationOptions) -> bool {
            true
        }

        async fn run(&self, _ctx: &mut MigrationContext) -> Result<StepOutcome> {
            Err(ModbayError::Other("boom".into()))
        }
    }

    fn populate(source: &std::path::Path) {
        let layout = LegacyLayout::new(source, "default");
        write_file(&layout.classification_dir().join("fire"), "lw\nifrit\n");
        write_file(
            &layout.mods_index_dir().join("index_1.json"),
            r#"[{"hash": "aaa", "name": "A", "category": "lw"}]"#,
        );
        write_file(&layout.archives_dir().join("aaa"), ZIP_BYTES);
    }

    #[tokio::test]
    async fn test_missing_source_runs_nothing() {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("data");
        let migrator = Migrator::new(&data, services(&data));

        let result = migrator
            .migrate(MigrationOptions::new(temp.path().join("nope")))
            .await;

        assert!(!result.success);
        assert!(result.step_reports.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert!(!data.join("archives").exists());
    }

    #[tokio::test]
    async fn test_missing_environment_is_structural() {
        let temp = TempDir::new().unwrap();
        let source = legacy_source(temp.path());
        let data = temp.path().join("data");
        let migrator = Migrator::new(&data, services(&data));

        let result = migrator
            .migrate(MigrationOptions::new(&source).with_environment("other"))
            .await;
        assert!(!result.success);
        assert!(result.step_reports.is_empty());
    }

    #[tokio::test]
    async fn test_full_run_recomputes_counts() {
        let temp = TempDir::new().unwrap();
        let source = legacy_source(temp.path());
        populate(&source);
        let data = temp.path().join("data");
        let migrator = Migrator::new(&data, services(&data));

        let result = migrator.migrate(MigrationOptions::new(&source)).await;

        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.step_reports.len(), 6);
        assert_eq!(result.classification_rules_created, 3);
        assert_eq!(result.mods_migrated, 1);
        assert!(result.validation.as_ref().unwrap().is_consistent());

        let store = &migrator.services().classifications;
        assert_eq!(store.get_node("lw").unwrap().unwrap().mod_count, 1);
        assert_eq!(store.get_node("fire").unwrap().unwrap().mod_count, 1);
    }

    #[tokio::test]
    async fn test_failed_step_degrades_dependent() {
        let temp = TempDir::new().unwrap();
        let source = legacy_source(temp.path());
        populate(&source);
        let data = temp.path().join("data");

        let mut steps = default_steps();
        steps[2] = Box::new(FailingStep(MigrationStage::MigrateClassifications));
        let migrator = Migrator::new(&data, services(&data)).with_steps(steps);

        let result = migrator.migrate(MigrationOptions::new(&source)).await;

        assert!(!result.success);
        let status = |stage| result.step(stage).unwrap().status;
        assert_eq!(status(MigrationStage::MigrateClassifications), StepStatus::Failed);
        assert_eq!(
            status(MigrationStage::MigrateClassificationThumbnails),
            StepStatus::Degraded
        );
        // independent steps still ran
        assert_eq!(status(MigrationStage::MigrateModArchives), StepStatus::Completed);
        assert_eq!(result.mods_migrated, 1);
    }

    #[tokio::test]
    async fn test_disabled_steps_are_skipped() {
        let temp = TempDir::new().unwrap();
        let source = legacy_source(temp.path());
        populate(&source);
        let data = temp.path().join("data");
        let migrator = Migrator::new(&data, services(&data));

        let mut options = MigrationOptions::new(&source);
        options.migrate_archives = false;
        options.migrate_metadata = false;
        let result = migrator.migrate(options).await;

        assert!(result.success);
        assert_eq!(
            result.step(MigrationStage::MigrateModArchives).unwrap().status,
            StepStatus::Skipped
        );
        assert!(result.validation.is_none());
        assert_eq!(result.mods_migrated, 0);
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let temp = TempDir::new().unwrap();
        let source = legacy_source(temp.path());
        populate(&source);
        let data = temp.path().join("data");
        let migrator = Migrator::new(&data, services(&data));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = migrator
            .migrate_with(MigrationOptions::new(&source), cancel, None)
            .await;

        assert!(result.cancelled);
        assert!(!result.success);
        assert!(result.step_reports.is_empty());
    }

    #[tokio::test]
    async fn test_progress_is_monotonic() {
        let temp = TempDir::new().unwrap();
        let source = legacy_source(temp.path());
        populate(&source);
        let data = temp.path().join("data");
        let migrator = Migrator::new(&data, services(&data));

        let seen: Arc<Mutex<Vec<MigrationProgress>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: ProgressCallback =
            Arc::new(move |p: &MigrationProgress| sink.lock().unwrap().push(p.clone()));

        migrator
            .migrate_with(MigrationOptions::new(&source), CancellationToken::new(), Some(callback))
            .await;

        let seen = seen.lock().unwrap();
        assert!(seen.windows(2).all(|w| w[0].percent <= w[1].percent));
        assert_eq!(seen.last().unwrap().stage, MigrationStage::Done);
        assert!(seen.iter().any(|p| p.current_item.starts_with("Copying A... (1/1)")));
    }
}
