//! Migration request, progress and result types.

use crate::classification::MappingCollision;
use crate::config::MigrationConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_environment() -> String {
    MigrationConfig::DEFAULT_ENVIRONMENT.to_string()
}

fn default_true() -> bool {
    true
}

/// How legacy archives reach the data root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveHandling {
    #[default]
    Copy,
    Move,
    /// Hard link, falling back to copy when linking is impossible.
    Hardlink,
}

/// Per-run migration options. Immutable once a run starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationOptions {
    #[serde(alias = "source_path")]
    pub source_path: PathBuf,
    #[serde(default = "default_environment", alias = "environment_name")]
    pub environment_name: String,
    #[serde(default = "default_true", alias = "migrate_classifications")]
    pub migrate_classifications: bool,
    #[serde(default = "default_true", alias = "migrate_metadata")]
    pub migrate_metadata: bool,
    #[serde(default = "default_true", alias = "migrate_archives")]
    pub migrate_archives: bool,
    #[serde(default = "default_true", alias = "migrate_previews")]
    pub migrate_previews: bool,
    #[serde(default = "default_true", alias = "migrate_configuration")]
    pub migrate_configuration: bool,
    #[serde(default, alias = "archive_handling")]
    pub archive_handling: ArchiveHandling,
}

impl MigrationOptions {
    /// Everything enabled, default environment, archives copied.
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            environment_name: default_environment(),
            migrate_classifications: true,
            migrate_metadata: true,
            migrate_archives: true,
            migrate_previews: true,
            migrate_configuration: true,
            archive_handling: ArchiveHandling::Copy,
        }
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment_name = environment.into();
        self
    }
}

/// Migration stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStage {
    AnalyzeSource,
    MigrateConfiguration,
    MigrateClassifications,
    MigrateClassificationThumbnails,
    MigrateModArchives,
    MigrateModPreviews,
    Done,
}

impl MigrationStage {
    /// The six working stages, in order.
    pub const STEPS: [MigrationStage; 6] = [
        MigrationStage::AnalyzeSource,
        MigrationStage::MigrateConfiguration,
        MigrationStage::MigrateClassifications,
        MigrationStage::MigrateClassificationThumbnails,
        MigrationStage::MigrateModArchives,
        MigrationStage::MigrateModPreviews,
    ];

    /// Position in [`Self::STEPS`]; `Done` comes after the last step.
    pub fn index(&self) -> usize {
        Self::STEPS
            .iter()
            .position(|s| s == self)
            .unwrap_or(Self::STEPS.len())
    }

    pub fn label(&self) -> &'static str {
        match self {
            MigrationStage::AnalyzeSource => "Analyzing source",
            MigrationStage::MigrateConfiguration => "Migrating configuration",
            MigrationStage::MigrateClassifications => "Migrating classifications",
            MigrationStage::MigrateClassificationThumbnails => "Migrating classification thumbnails",
            MigrationStage::MigrateModArchives => "Migrating mod archives",
            MigrationStage::MigrateModPreviews => "Migrating mod previews",
            MigrationStage::Done => "Done",
        }
    }
}

impl std::fmt::Display for MigrationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Progress snapshot delivered to progress callbacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationProgress {
    pub stage: MigrationStage,
    pub current_item: String,
    pub processed: usize,
    pub total: usize,
    /// Overall completion across all stages, 0.0 to 100.0.
    pub percent: f32,
}

impl MigrationProgress {
    pub fn new(
        stage: MigrationStage,
        current_item: impl Into<String>,
        processed: usize,
        total: usize,
    ) -> Self {
        let steps = MigrationStage::STEPS.len() as f32;
        let within = if total == 0 {
            0.0
        } else {
            (processed.min(total) as f32) / (total as f32)
        };
        let percent = if stage == MigrationStage::Done {
            100.0
        } else {
            ((stage.index() as f32 + within) / steps * 100.0).min(100.0)
        };

        Self {
            stage,
            current_item: current_item.into(),
            processed,
            total,
            percent,
        }
    }
}

/// One non-fatal failure recorded during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationItemError {
    pub stage: MigrationStage,
    /// Hash, file name or node id identifying the failed item.
    pub item: String,
    pub message: String,
}

/// How a step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    /// Toggled off by the options.
    Skipped,
    /// The step returned an error; recorded and the run continued.
    Failed,
    /// A step it depends on failed, so it ran as a no-op.
    Degraded,
}

/// What a step reports back to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepOutcome {
    pub items_processed: usize,
}

impl StepOutcome {
    pub fn processed(items_processed: usize) -> Self {
        Self { items_processed }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub stage: MigrationStage,
    pub status: StepStatus,
    pub items_processed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What the analysis step found in the legacy installation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceAnalysis {
    pub source_path: PathBuf,
    pub environment: String,
    pub classification_files: usize,
    pub classification_objects: usize,
    pub redirection_entries: usize,
    pub index_shards: usize,
    pub mod_records: usize,
    pub archive_files: usize,
    pub preview_files: usize,
    pub configuration_files: usize,
    #[serde(default)]
    pub collisions: Vec<MappingCollision>,
}

/// Cross-check between archive files and catalog entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveValidation {
    pub archives_without_entry: Vec<String>,
    pub entries_without_archive: Vec<String>,
}

impl ArchiveValidation {
    pub fn is_consistent(&self) -> bool {
        self.archives_without_entry.is_empty() && self.entries_without_archive.is_empty()
    }
}

/// Accumulated outcome of one migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResult {
    pub success: bool,
    pub cancelled: bool,
    pub classification_rules_created: usize,
    pub classification_thumbnails_linked: usize,
    pub configuration_keys_migrated: usize,
    pub mods_migrated: usize,
    pub archives_copied: usize,
    pub previews_copied: usize,
    /// Items already present from an earlier run.
    pub skipped_existing: usize,
    pub errors: Vec<MigrationItemError>,
    pub step_reports: Vec<StepReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<SourceAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ArchiveValidation>,
    pub started_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
}

impl MigrationResult {
    pub fn started() -> Self {
        Self {
            started_at: chrono::Utc::now().to_rfc3339(),
            ..Default::default()
        }
    }

    /// Report for `stage`, if it ran.
    pub fn step(&self, stage: MigrationStage) -> Option<&StepReport> {
        self.step_reports.iter().find(|r| r.stage == stage)
    }

    pub fn errors_for(&self, stage: MigrationStage) -> impl Iterator<Item = &MigrationItemError> {
        self.errors.iter().filter(move |e| e.stage == stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults_from_json() {
        let options: MigrationOptions =
            serde_json::from_str(r#"{"sourcePath": "/legacy"}"#).unwrap();
        assert_eq!(options, MigrationOptions::new("/legacy"));
    }

    #[test]
    fn test_options_accept_snake_case() {
        let options: MigrationOptions = serde_json::from_str(
            r#"{"source_path": "/legacy", "environment_name": "alt",
                "migrate_previews": false, "archive_handling": "move"}"#,
        )
        .unwrap();
        assert_eq!(options.environment_name, "alt");
        assert!(!options.migrate_previews);
        assert_eq!(options.archive_handling, ArchiveHandling::Move);
    }

    #[test]
    fn test_progress_percent() {
        let first = MigrationProgress::new(MigrationStage::AnalyzeSource, "", 0, 0);
        assert_eq!(first.percent, 0.0);

        let half_of_archives = MigrationProgress::new(MigrationStage::MigrateModArchives, "x", 5, 10);
        assert!((half_of_archives.percent - 75.0).abs() < 0.01);

        let done = MigrationProgress::new(MigrationStage::Done, "", 0, 0);
        assert_eq!(done.percent, 100.0);
    }

    #[test]
    fn test_stage_order() {
        assert_eq!(MigrationStage::AnalyzeSource.index(), 0);
        assert_eq!(MigrationStage::MigrateModPreviews.index(), 5);
        assert_eq!(MigrationStage::Done.index(), 6);
    }
}
