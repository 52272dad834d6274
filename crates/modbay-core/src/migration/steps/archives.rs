//! Step 5: mod archives and their catalog entries.
//!
//! An entry is only inserted after its archive landed in the data root, and
//! the archive is taken back out if the insert fails. That keeps "entry
//! without archive" and "archive without entry" impossible per item.

use super::MigrationStep;
use crate::catalog::ModCatalogEntry;
use crate::error::{ModbayError, Result};
use crate::files::ArchiveFormat;
use crate::legacy::{parse_mod_index, LegacyModRecord};
use crate::migration::context::MigrationContext;
use crate::migration::types::{ArchiveHandling, MigrationOptions, MigrationStage, StepOutcome};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

pub struct MigrateModArchivesStep;

/// What happened to one index record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordOutcome {
    /// Archive transferred and entry created.
    Migrated,
    /// Existing entry refreshed with index metadata.
    Updated,
    /// Entry already present; archive repaired if it was missing.
    Existing { repaired: bool },
    /// Nothing to do under the current toggles.
    Skipped,
}

impl MigrateModArchivesStep {
    fn entry_from_record(sha: &str, record: &LegacyModRecord, format: ArchiveFormat) -> ModCatalogEntry {
        ModCatalogEntry {
            name: record.display_name().to_string(),
            author: record.author.clone(),
            category: record.category.clone().unwrap_or_default(),
            tags: record.tags.clone(),
            grading: record.grading.clone(),
            description: record.description.clone(),
            ..ModCatalogEntry::bare(sha, format)
        }
    }

    async fn transfer(ctx: &MigrationContext, source: &Path, target: &Path) -> Result<()> {
        let files = &ctx.services.files;
        match ctx.options.archive_handling {
            ArchiveHandling::Copy => files.copy_file(source, target).await,
            ArchiveHandling::Move => files.move_file(source, target).await,
            ArchiveHandling::Hardlink => files.hard_link_or_copy(source, target).await.map(|_| ()),
        }
    }

    /// Undo a transfer whose catalog insert failed.
    async fn roll_back(ctx: &MigrationContext, source: &Path, target: &Path) {
        let files = &ctx.services.files;
        let undone = match ctx.options.archive_handling {
            ArchiveHandling::Move => files.move_file(target, source).await,
            ArchiveHandling::Copy | ArchiveHandling::Hardlink => files.remove_file(target).await,
        };
        if let Err(e) = undone {
            warn!("Failed to roll back archive {}: {}", target.display(), e);
        }
    }

    /// Transfer the archive for `sha`, then insert `entry` built from its format.
    ///
    /// A target left by an earlier interrupted run is reused when it holds
    /// the same bytes as the legacy archive.
    async fn import_archive(
        ctx: &MigrationContext,
        sha: &str,
        record: Option<&LegacyModRecord>,
    ) -> Result<()> {
        let files = &ctx.services.files;
        let source = ctx.layout.archives_dir().join(sha);
        let target = ctx.archives_dir().join(sha);
        if !source.is_file() {
            return Err(ModbayError::FileNotFound(source));
        }

        let reused = target.is_file() && files.same_contents(&source, &target).await?;
        if reused {
            debug!("Archive {} already in the data root, reusing it", sha);
        } else {
            Self::transfer(ctx, &source, &target).await?;
        }

        let inserted = async {
            let format = files.detect_archive_format(&target).await?;
            let entry = match (record, ctx.options.migrate_metadata) {
                (Some(record), true) => Self::entry_from_record(sha, record, format),
                _ => ModCatalogEntry::bare(sha, format),
            };
            ctx.services.catalog.insert(&entry)
        }
        .await;

        if let Err(e) = inserted {
            if !reused {
                Self::roll_back(ctx, &source, &target).await;
            }
            return Err(e);
        }

        if reused && ctx.options.archive_handling == ArchiveHandling::Move {
            files.remove_file(&source).await?;
        }
        Ok(())
    }

    async fn process_record(
        ctx: &MigrationContext,
        sha: &str,
        record: &LegacyModRecord,
    ) -> Result<RecordOutcome> {
        let catalog = &ctx.services.catalog;
        let target = ctx.archives_dir().join(sha);

        if let Some(existing) = catalog.get_by_hash(sha)? {
            let mut repaired = false;
            if ctx.options.migrate_archives && !target.exists() {
                let source = ctx.layout.archives_dir().join(sha);
                if source.is_file() {
                    Self::transfer(ctx, &source, &target).await?;
                    repaired = true;
                }
            }
            if ctx.options.migrate_metadata && !ctx.options.migrate_archives {
                let refreshed = ModCatalogEntry {
                    format: existing.format,
                    preview: existing.preview.clone(),
                    added_at: existing.added_at.clone(),
                    ..Self::entry_from_record(sha, record, existing.format)
                };
                if refreshed != existing {
                    catalog.update(&refreshed)?;
                    return Ok(RecordOutcome::Updated);
                }
            }
            return Ok(RecordOutcome::Existing { repaired });
        }

        if ctx.options.migrate_archives {
            Self::import_archive(ctx, sha, Some(record)).await?;
            return Ok(RecordOutcome::Migrated);
        }

        // Metadata only: an entry needs an archive already in place.
        if target.is_file() {
            let format = ctx.services.files.detect_archive_format(&target).await?;
            catalog.insert(&Self::entry_from_record(sha, record, format))?;
            return Ok(RecordOutcome::Updated);
        }
        debug!("No archive for {} in the data root, metadata skipped", sha);
        Ok(RecordOutcome::Skipped)
    }

    /// Legacy archive names not covered by the index, in name order.
    async fn unindexed_archives(ctx: &MigrationContext, indexed: &HashSet<String>) -> Result<Vec<String>> {
        let dir = ctx.layout.archives_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| ModbayError::io_with_path(e, &dir))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ModbayError::io_with_path(e, &dir))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if entry.path().is_file() && !name.starts_with('.') && !indexed.contains(&name) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    fn apply(ctx: &mut MigrationContext, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Migrated => {
                ctx.result.mods_migrated += 1;
                ctx.result.archives_copied += 1;
            }
            RecordOutcome::Updated => ctx.result.mods_migrated += 1,
            RecordOutcome::Existing { repaired } => {
                ctx.result.skipped_existing += 1;
                if repaired {
                    ctx.result.archives_copied += 1;
                }
            }
            RecordOutcome::Skipped => {}
        }
    }
}

/// A hash is used as a file name, so it must be a single path component.
fn is_valid_hash(sha: &str) -> bool {
    !sha.is_empty()
        && sha != "."
        && sha != ".."
        && !sha.contains(['/', '\\'])
}

#[async_trait]
impl MigrationStep for MigrateModArchivesStep {
    fn stage(&self) -> MigrationStage {
        MigrationStage::MigrateModArchives
    }

    fn is_enabled(&self, options: &MigrationOptions) -> bool {
        options.migrate_archives || options.migrate_metadata
    }

    async fn run(&self, ctx: &mut MigrationContext) -> Result<StepOutcome> {
        let index = parse_mod_index(&ctx.layout.mods_index_dir()).await?;
        for (shard, message) in &index.stats.failed_shards {
            ctx.record_error(shard.display().to_string(), message.clone());
        }
        if index.stats.records_invalid > 0 {
            info!(
                "Skipped {} mod index records without a hash",
                index.stats.records_invalid
            );
        }

        if ctx.options.migrate_archives {
            let archives_dir = ctx.archives_dir();
            ctx.services.files.ensure_directory_exists(&archives_dir).await?;
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut processed = 0;
        let total = index.len();

        for (position, record) in index.entries.iter().enumerate() {
            ctx.check_cancelled()?;
            let name = record.display_name().to_string();
            ctx.report(
                format!("Copying {}... ({}/{})", name, position + 1, total),
                position,
                total,
            );

            let sha = record.hash.as_deref().map(str::trim).unwrap_or_default().to_string();
            if !is_valid_hash(&sha) {
                ctx.record_error(format!("{} ({})", sha, name), "invalid mod hash");
                continue;
            }
            if !seen.insert(sha.clone()) {
                debug!("Duplicate index record for {}, keeping the first", sha);
                continue;
            }

            processed += 1;
            match Self::process_record(ctx, &sha, record).await {
                Ok(outcome) => Self::apply(ctx, outcome),
                Err(e) => ctx.record_error(format!("{} ({})", sha, name), e.to_string()),
            }
        }

        if ctx.options.migrate_archives {
            let orphans = Self::unindexed_archives(ctx, &seen).await?;
            if !orphans.is_empty() {
                info!("{} archives have no index record", orphans.len());
            }
            for sha in orphans {
                ctx.check_cancelled()?;
                ctx.report(format!("Copying {}...", sha), total, total);
                processed += 1;

                if ctx.services.catalog.exists_by_hash(&sha)? {
                    ctx.result.skipped_existing += 1;
                    continue;
                }
                match Self::import_archive(ctx, &sha, None).await {
                    Ok(()) => Self::apply(ctx, RecordOutcome::Migrated),
                    Err(e) => ctx.record_error(sha.clone(), e.to_string()),
                }
            }
        }

        ctx.report("Mod archives migrated", total, total);
        info!(
            "Mod archives: {} migrated, {} archives transferred, {} already present",
            ctx.result.mods_migrated, ctx.result.archives_copied, ctx.result.skipped_existing
        );
        Ok(StepOutcome::processed(processed))
    }
}
