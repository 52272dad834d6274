//! Step 6: preview images for migrated mods.

use super::MigrationStep;
use crate::error::{ModbayError, Result};
use crate::migration::context::MigrationContext;
use crate::migration::types::{MigrationOptions, MigrationStage, StepOutcome};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct MigrateModPreviewsStep;

/// Hash a preview file belongs to: its stem, or the part before the first `_`.
fn preview_owner(path: &Path) -> Option<&str> {
    let stem = path.file_stem()?.to_str()?;
    let owner = stem.split_once('_').map_or(stem, |(sha, _)| sha);
    (!owner.is_empty()).then_some(owner)
}

impl MigrateModPreviewsStep {
    /// Supported preview files grouped by owning hash, in file-name order.
    async fn collect(ctx: &MigrationContext) -> Result<BTreeMap<String, Vec<PathBuf>>> {
        let dir = ctx.layout.previews_dir();
        let mut grouped: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        if !dir.is_dir() {
            return Ok(grouped);
        }

        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| ModbayError::io_with_path(e, &dir))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ModbayError::io_with_path(e, &dir))?
        {
            let path = entry.path();
            if path.is_file() && ctx.services.images.is_supported_image(&path) {
                files.push(path);
            }
        }
        files.sort();

        for path in files {
            if let Some(owner) = preview_owner(&path) {
                grouped.entry(owner.to_string()).or_default().push(path);
            }
        }
        Ok(grouped)
    }

    /// Copy one mod's previews; the first becomes the entry's preview.
    async fn migrate_mod(ctx: &mut MigrationContext, sha: &str, files: &[PathBuf]) -> Result<()> {
        let Some(mut entry) = ctx.services.catalog.get_by_hash(sha)? else {
            info!("Previews for {} have no catalog entry, skipping", sha);
            return Ok(());
        };

        let target_dir = ctx.previews_dir().join(sha);
        let mut first: Option<PathBuf> = None;

        for file in files {
            let Some(file_name) = file.file_name() else {
                continue;
            };
            let target = target_dir.join(file_name);
            if target.exists() {
                debug!("Preview {} already present", target.display());
                ctx.result.skipped_existing += 1;
            } else {
                match ctx.services.files.copy_file(file, &target).await {
                    Ok(()) => ctx.result.previews_copied += 1,
                    Err(e) => {
                        ctx.record_error(file.display().to_string(), e.to_string());
                        continue;
                    }
                }
            }
            first.get_or_insert(target);
        }

        if let Some(first) = first {
            if entry.preview.is_none() {
                entry.preview = Some(first.to_string_lossy().to_string());
                ctx.services.catalog.update(&entry)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MigrationStep for MigrateModPreviewsStep {
    fn stage(&self) -> MigrationStage {
        MigrationStage::MigrateModPreviews
    }

    fn is_enabled(&self, options: &MigrationOptions) -> bool {
        options.migrate_previews
    }

    fn depends_on(&self) -> &'static [MigrationStage] {
        &[MigrationStage::MigrateModArchives]
    }

    async fn run(&self, ctx: &mut MigrationContext) -> Result<StepOutcome> {
        let grouped = Self::collect(ctx).await?;
        if grouped.is_empty() {
            info!("No preview images found, nothing to migrate");
            return Ok(StepOutcome::default());
        }

        let total = grouped.len();
        for (position, (sha, files)) in grouped.iter().enumerate() {
            ctx.check_cancelled()?;
            ctx.report(
                format!("Copying previews for {}... ({}/{})", sha, position + 1, total),
                position,
                total,
            );
            if let Err(e) = Self::migrate_mod(ctx, sha, files).await {
                ctx.record_error(sha.clone(), e.to_string());
            }
        }

        ctx.report("Previews migrated", total, total);
        info!("Previews: {} copied", ctx.result.previews_copied);
        Ok(StepOutcome::processed(total))
    }
}
