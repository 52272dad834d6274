//! Per-run state threaded through the migration steps.

use super::progress::ProgressCallback;
use super::types::{
    MigrationItemError, MigrationOptions, MigrationProgress, MigrationResult, MigrationStage,
};
use crate::cancel::CancellationToken;
use crate::catalog::ModCatalog;
use crate::classification::ClassificationStore;
use crate::config::{LegacyLayout, PathsConfig};
use crate::error::Result;
use crate::files::{FileService, ImageService};
use crate::settings::SettingsStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Collaborators the steps read from and write to.
#[derive(Clone)]
pub struct MigrationServices {
    pub classifications: Arc<dyn ClassificationStore>,
    pub catalog: Arc<dyn ModCatalog>,
    pub files: Arc<dyn FileService>,
    pub images: Arc<dyn ImageService>,
    pub settings: SettingsStore,
}

/// State of one migration run.
///
/// Built fresh for every run. Steps read what they need and append their
/// counters and errors to `result`; nothing resets earlier contributions.
pub struct MigrationContext {
    pub options: MigrationOptions,
    pub layout: LegacyLayout,
    pub services: MigrationServices,
    pub result: MigrationResult,
    pub cancel: CancellationToken,
    data_root: PathBuf,
    stage: MigrationStage,
    on_progress: Option<ProgressCallback>,
}

impl MigrationContext {
    pub fn new(
        options: MigrationOptions,
        data_root: impl Into<PathBuf>,
        services: MigrationServices,
        cancel: CancellationToken,
        on_progress: Option<ProgressCallback>,
    ) -> Self {
        let layout = LegacyLayout::new(&options.source_path, &options.environment_name);
        Self {
            options,
            layout,
            services,
            result: MigrationResult::started(),
            cancel,
            data_root: data_root.into(),
            stage: MigrationStage::AnalyzeSource,
            on_progress,
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn archives_dir(&self) -> PathBuf {
        PathsConfig::archives_dir(&self.data_root)
    }

    pub fn previews_dir(&self) -> PathBuf {
        PathsConfig::previews_dir(&self.data_root)
    }

    pub fn thumbnails_dir(&self) -> PathBuf {
        PathsConfig::thumbnails_dir(&self.data_root)
    }

    pub fn stage(&self) -> MigrationStage {
        self.stage
    }

    pub(crate) fn enter_stage(&mut self, stage: MigrationStage) {
        self.stage = stage;
        self.report(stage.label(), 0, 0);
    }

    /// Emit a progress tick for the current stage.
    pub fn report(&self, item: impl Into<String>, processed: usize, total: usize) {
        if let Some(callback) = &self.on_progress {
            let progress = MigrationProgress::new(self.stage, item, processed, total);
            callback(&progress);
        }
    }

    /// Record a non-fatal per-item failure against the current stage.
    pub fn record_error(&mut self, item: impl Into<String>, message: impl Into<String>) {
        let item = item.into();
        let message = message.into();
        warn!("[{}] {}: {}", self.stage.label(), item, message);
        self.result.errors.push(MigrationItemError {
            stage: self.stage,
            item,
            message,
        });
    }

    /// Fail with `MigrationCancelled` once cancellation was requested.
    pub fn check_cancelled(&self) -> Result<()> {
        self.cancel.check()
    }
}
