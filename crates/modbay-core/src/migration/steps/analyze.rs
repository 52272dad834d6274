//! Step 1: inventory of the legacy installation.

use super::MigrationStep;
use crate::classification::validate_mapping;
use crate::config::LegacyLayout;
use crate::error::{ModbayError, Result};
use crate::legacy::{is_index_shard, parse_classifications, parse_mod_index, parse_redirection};
use crate::migration::context::MigrationContext;
use crate::migration::types::{MigrationOptions, MigrationStage, SourceAnalysis, StepOutcome};
use async_trait::async_trait;
use std::path::Path;
use tracing::info;

pub struct AnalyzeSourceStep;

#[async_trait]
impl MigrationStep for AnalyzeSourceStep {
    fn stage(&self) -> MigrationStage {
        MigrationStage::AnalyzeSource
    }

    fn is_enabled(&self, _options: &MigrationOptions) -> bool {
        true
    }

    async fn run(&self, ctx: &mut MigrationContext) -> Result<StepOutcome> {
        let analysis = analyze_source(&ctx.layout).await?;
        for collision in &analysis.collisions {
            info!("Classification collision: {}", collision);
        }
        let found = analysis.classification_files
            + analysis.mod_records
            + analysis.archive_files
            + analysis.preview_files;
        ctx.report(
            format!(
                "Found {} categories, {} mods, {} archives",
                analysis.classification_files, analysis.mod_records, analysis.archive_files
            ),
            1,
            1,
        );
        ctx.result.analysis = Some(analysis);
        Ok(StepOutcome::processed(found))
    }
}

/// Count what a migration of `layout` would read.
pub async fn analyze_source(layout: &LegacyLayout) -> Result<SourceAnalysis> {
    if !layout.source().is_dir() {
        return Err(ModbayError::InvalidSource {
            path: layout.source().to_path_buf(),
            reason: "source directory does not exist".to_string(),
        });
    }

    let mapping = parse_classifications(&layout.classification_dir()).await?;
    let mut redirection_entries = 0;
    for candidate in layout.redirection_candidates() {
        if candidate.is_file() {
            redirection_entries = parse_redirection(&candidate).await?.len();
            break;
        }
    }
    let index = parse_mod_index(&layout.mods_index_dir()).await?;

    let configuration_files = [
        layout.local_configuration(),
        layout.environment_configuration(),
    ]
    .iter()
    .filter(|p| p.is_file())
    .count();

    let analysis = SourceAnalysis {
        source_path: layout.source().to_path_buf(),
        environment: layout.environment().to_string(),
        classification_files: mapping.len(),
        classification_objects: mapping.object_count(),
        redirection_entries,
        index_shards: count_files(&layout.mods_index_dir(), |name| is_index_shard(name)).await?,
        mod_records: index.len(),
        archive_files: count_files(&layout.archives_dir(), |_| true).await?,
        preview_files: count_files(&layout.previews_dir(), |_| true).await?,
        configuration_files,
        collisions: validate_mapping(&mapping).collisions,
    };

    info!(
        "Analyzed {}: {} categories, {} objects, {} mod records, {} archives, {} previews",
        layout.source().display(),
        analysis.classification_files,
        analysis.classification_objects,
        analysis.mod_records,
        analysis.archive_files,
        analysis.preview_files
    );

    Ok(analysis)
}

/// Regular files directly in `dir` whose name passes `filter`. Missing dir counts zero.
async fn count_files(dir: &Path, filter: impl Fn(&str) -> bool) -> Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }
    let mut count = 0;
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ModbayError::io_with_path(e, dir))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ModbayError::io_with_path(e, dir))?
    {
        let name = entry.file_name().to_string_lossy().to_string();
        if entry.path().is_file() && filter(&name) {
            count += 1;
        }
    }
    Ok(count)
}
