//! Step 3: classification files into the two-level tree.

use super::MigrationStep;
use crate::classification::{validate_mapping, BuildReport, ClassificationTreeBuilder};
use crate::error::Result;
use crate::legacy::parse_classifications;
use crate::migration::context::MigrationContext;
use crate::migration::types::{MigrationOptions, MigrationStage, StepOutcome};
use async_trait::async_trait;
use tracing::info;

pub struct MigrateClassificationsStep;

#[async_trait]
impl MigrationStep for MigrateClassificationsStep {
    fn stage(&self) -> MigrationStage {
        MigrationStage::MigrateClassifications
    }

    fn is_enabled(&self, options: &MigrationOptions) -> bool {
        options.migrate_classifications
    }

    async fn run(&self, ctx: &mut MigrationContext) -> Result<StepOutcome> {
        let mapping = parse_classifications(&ctx.layout.classification_dir()).await?;
        for (path, message) in &mapping.failed_files {
            ctx.record_error(path.display().to_string(), message.clone());
        }
        if mapping.is_empty() {
            info!("No classification files found, nothing to migrate");
            return Ok(StepOutcome::default());
        }

        let validation = validate_mapping(&mapping);
        for collision in &validation.collisions {
            ctx.record_error(collision.id.clone(), collision.to_string());
        }

        let services = ctx.services.clone();
        let builder =
            ClassificationTreeBuilder::new(&*services.classifications, &*services.catalog);
        let mut report = BuildReport::default();
        let total = mapping.len();

        for (index, entry) in mapping.iter().enumerate() {
            ctx.check_cancelled()?;
            ctx.report(
                format!("Creating {}... ({}/{})", entry.category, index + 1, total),
                index,
                total,
            );
            if let Err(e) = builder.build_category(entry, &validation, &mut report) {
                ctx.record_error(entry.category.clone(), e.to_string());
            }
        }

        ctx.result.classification_rules_created += report.nodes_created();
        ctx.result.skipped_existing += report.existing;
        ctx.report("Classifications migrated", total, total);
        info!(
            "Classifications: {} categories and {} objects created, {} existing, {} mods linked",
            report.categories_created, report.objects_created, report.existing, report.linked_mods
        );

        Ok(StepOutcome::processed(total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::context::fixtures::{context, legacy_source, write_file};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_sample_classifications() {
        let temp = TempDir::new().unwrap();
        let source = legacy_source(temp.path());
        let mut ctx = context(&source, &temp.path().join("data"));
        let dir = ctx.layout.classification_dir();
        write_file(&dir.join("干员·灼热"), "莱万汀\n伊芙利特\n");
        write_file(&dir.join("干员·寒冷"), "冰雪\n  \n霜降\n");

        MigrateClassificationsStep.run(&mut ctx).await.unwrap();

        assert_eq!(ctx.result.classification_rules_created, 6);
        let tree = ctx.services.classifications.load_tree().unwrap();
        assert_eq!(tree.len(), 2);
        assert!(tree.iter().all(|n| n.priority == 100));
        let node = ctx
            .services
            .classifications
            .get_node_by_name("莱万汀")
            .unwrap()
            .unwrap();
        assert_eq!(node.id, "莱万汀");
        assert_eq!(node.parent_id.as_deref(), Some("干员·灼热"));
    }

    #[tokio::test]
    async fn test_collisions_are_recorded_not_fatal() {
        let temp = TempDir::new().unwrap();
        let source = legacy_source(temp.path());
        let mut ctx = context(&source, &temp.path().join("data"));
        let dir = ctx.layout.classification_dir();
        write_file(&dir.join("a"), "shared\n");
        write_file(&dir.join("b"), "shared\na\n");

        MigrateClassificationsStep.run(&mut ctx).await.unwrap();

        assert_eq!(ctx.result.classification_rules_created, 3);
        assert_eq!(ctx.result.errors.len(), 2);
        let shared = ctx.services.classifications.get_node("shared").unwrap().unwrap();
        assert_eq!(shared.parent_id.as_deref(), Some("a"));
        let a = ctx.services.classifications.get_node("a").unwrap().unwrap();
        assert!(a.is_root());
    }

    #[tokio::test]
    async fn test_missing_directory_creates_nothing() {
        let temp = TempDir::new().unwrap();
        let source = legacy_source(temp.path());
        let mut ctx = context(&source, &temp.path().join("data"));
        std::fs::remove_dir_all(ctx.layout.classification_dir()).unwrap();

        let outcome = MigrateClassificationsStep.run(&mut ctx).await.unwrap();
        assert_eq!(outcome.items_processed, 0);
        assert_eq!(ctx.result.classification_rules_created, 0);
    }
}
