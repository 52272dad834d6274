//! Staged migration from a legacy installation.
//!
//! Steps run strictly in order:
//!
//! 1. Analyze source
//! 2. Configuration
//! 3. Classifications
//! 4. Classification thumbnails (needs 3)
//! 5. Mod archives and metadata
//! 6. Mod previews (needs 5)
//!
//! A failing step is recorded and the run continues; a step whose
//! dependency failed runs as a no-op. After the last step the node counts
//! are recomputed from the catalog and the archive directory is
//! cross-checked against it.

mod context;
mod manager;
mod orchestrator;
mod progress;
pub mod steps;
mod types;
mod validation;

pub use context::{MigrationContext, MigrationServices};
pub use manager::MigrationManager;
pub use orchestrator::Migrator;
pub use progress::{MigrationProgressTracker, MigrationRecord, MigrationStatus, ProgressCallback};
pub use steps::{analyze_source, MigrationStep};
pub use types::{
    ArchiveHandling, ArchiveValidation, MigrationItemError, MigrationOptions, MigrationProgress,
    MigrationResult, MigrationStage, SourceAnalysis, StepOutcome, StepReport, StepStatus,
};
pub use validation::validate_archives;
