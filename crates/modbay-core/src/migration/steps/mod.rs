//! The six migration steps and their common contract.

mod analyze;
mod archives;
mod classifications;
mod configuration;
mod previews;
mod thumbnails;

pub use analyze::{analyze_source, AnalyzeSourceStep};
pub use archives::MigrateModArchivesStep;
pub use classifications::MigrateClassificationsStep;
pub use configuration::MigrateConfigurationStep;
pub use previews::MigrateModPreviewsStep;
pub use thumbnails::MigrateClassificationThumbnailsStep;

use super::context::MigrationContext;
use super::types::{MigrationOptions, MigrationStage, StepOutcome};
use crate::error::Result;
use async_trait::async_trait;

/// One discrete unit of migration work.
#[async_trait]
pub trait MigrationStep: Send + Sync {
    fn stage(&self) -> MigrationStage;

    /// Whether the options enable this step.
    fn is_enabled(&self, options: &MigrationOptions) -> bool;

    /// Stages whose failure turns this step into a no-op.
    fn depends_on(&self) -> &'static [MigrationStage] {
        &[]
    }

    /// Run the step, appending counters and item errors to `ctx.result`.
    ///
    /// An `Err` marks the whole step failed; per-item problems are recorded
    /// with [`MigrationContext::record_error`] instead.
    async fn run(&self, ctx: &mut MigrationContext) -> Result<StepOutcome>;
}

/// All steps in execution order.
pub fn default_steps() -> Vec<Box<dyn MigrationStep>> {
    vec![
        Box::new(AnalyzeSourceStep),
        Box::new(MigrateConfigurationStep),
        Box::new(MigrateClassificationsStep),
        Box::new(MigrateClassificationThumbnailsStep),
        Box::new(MigrateModArchivesStep),
        Box::new(MigrateModPreviewsStep),
    ]
}
