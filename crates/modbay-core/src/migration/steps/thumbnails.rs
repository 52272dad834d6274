//! Step 4: redirection thumbnails onto classification nodes.

use super::MigrationStep;
use crate::error::Result;
use crate::legacy::{parse_redirection, RedirectionMapping};
use crate::migration::context::MigrationContext;
use crate::migration::types::{MigrationOptions, MigrationStage, StepOutcome};
use async_trait::async_trait;
use tracing::{debug, info, warn};

pub struct MigrateClassificationThumbnailsStep;

/// Directory name for a node's thumbnails; ids may contain path separators.
fn node_dir_name(id: &str) -> String {
    match id {
        "." | ".." => id.replace('.', "_"),
        _ => id.replace(['/', '\\'], "_"),
    }
}

impl MigrateClassificationThumbnailsStep {
    async fn load_mapping(ctx: &MigrationContext) -> Result<RedirectionMapping> {
        for candidate in ctx.layout.redirection_candidates() {
            if candidate.is_file() {
                return parse_redirection(&candidate).await;
            }
        }
        Ok(RedirectionMapping::default())
    }
}

#[async_trait]
impl MigrationStep for MigrateClassificationThumbnailsStep {
    fn stage(&self) -> MigrationStage {
        MigrationStage::MigrateClassificationThumbnails
    }

    fn is_enabled(&self, options: &MigrationOptions) -> bool {
        options.migrate_classifications
    }

    fn depends_on(&self) -> &'static [MigrationStage] {
        &[MigrationStage::MigrateClassifications]
    }

    async fn run(&self, ctx: &mut MigrationContext) -> Result<StepOutcome> {
        let mapping = Self::load_mapping(ctx).await?;
        if mapping.is_empty() {
            info!("No redirection entries found, nothing to migrate");
            return Ok(StepOutcome::default());
        }

        let thumbnails_dir = ctx.thumbnails_dir();
        let total = mapping.len();
        let mut processed = 0;

        for (index, entry) in mapping.entries.iter().enumerate() {
            ctx.check_cancelled()?;
            ctx.report(
                format!("Linking {}... ({}/{})", entry.name, index + 1, total),
                index,
                total,
            );
            processed += 1;

            let node = match ctx.services.classifications.get_node_by_name(&entry.name) {
                Ok(Some(node)) => node,
                Ok(None) => {
                    debug!("No classification named {}, skipping thumbnail", entry.name);
                    continue;
                }
                Err(e) => {
                    ctx.record_error(entry.name.clone(), e.to_string());
                    continue;
                }
            };

            let image = mapping.resolve(entry);
            if !image.is_file() {
                warn!(
                    "Thumbnail for {} not found at {}",
                    entry.name,
                    image.display()
                );
                continue;
            }

            let file_name = match image.file_name() {
                Some(name) => name.to_owned(),
                None => continue,
            };
            let target = thumbnails_dir.join(node_dir_name(&node.id)).join(file_name);
            let linked = async {
                if !target.exists() {
                    ctx.services.files.copy_file(&image, &target).await?;
                }
                ctx.services
                    .classifications
                    .set_node_thumbnail(&node.id, &target.to_string_lossy())
            }
            .await;

            match linked {
                Ok(()) => ctx.result.classification_thumbnails_linked += 1,
                Err(e) => ctx.record_error(entry.name.clone(), e.to_string()),
            }
        }

        ctx.report("Thumbnails migrated", total, total);
        Ok(StepOutcome::processed(processed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::NewNode;
    use crate::migration::context::fixtures::{context, legacy_source, write_file};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_links_known_names_and_skips_unknown() {
        let temp = TempDir::new().unwrap();
        let source = legacy_source(temp.path());
        let mut ctx = context(&source, &temp.path().join("data"));
        let dir = ctx.layout.classification_dir();

        ctx.services
            .classifications
            .create_node(&NewNode::named("fire", None, 100))
            .unwrap();
        write_file(&dir.join("images/fire.png"), b"png");
        write_file(
            &dir.join("_redirection.ini"),
            "[thumbs]\nfire = images\\fire.png\nghost = images/ghost.png\n",
        );

        let outcome = MigrateClassificationThumbnailsStep.run(&mut ctx).await.unwrap();

        assert_eq!(outcome.items_processed, 2);
        assert_eq!(ctx.result.classification_thumbnails_linked, 1);
        assert!(ctx.result.errors.is_empty());
        let node = ctx.services.classifications.get_node("fire").unwrap().unwrap();
        let thumbnail = node.thumbnail.unwrap();
        assert!(thumbnail.ends_with("fire.png"));
        assert!(std::path::Path::new(&thumbnail).is_file());
    }

    #[tokio::test]
    async fn test_same_file_name_in_different_folders() {
        let temp = TempDir::new().unwrap();
        let source = legacy_source(temp.path());
        let mut ctx = context(&source, &temp.path().join("data"));
        let dir = ctx.layout.classification_dir();

        for id in ["fire", "ice"] {
            ctx.services
                .classifications
                .create_node(&NewNode::named(id, None, 100))
                .unwrap();
        }
        write_file(&dir.join("a/icon.png"), b"FIRE");
        write_file(&dir.join("b/icon.png"), b"ICE");
        write_file(
            &dir.join("_redirection.ini"),
            "fire = a/icon.png\nice = b/icon.png\n",
        );

        MigrateClassificationThumbnailsStep.run(&mut ctx).await.unwrap();
        assert_eq!(ctx.result.classification_thumbnails_linked, 2);

        let thumbnail = |id: &str| {
            let node = ctx.services.classifications.get_node(id).unwrap().unwrap();
            std::fs::read(node.thumbnail.unwrap()).unwrap()
        };
        assert_eq!(thumbnail("fire"), b"FIRE");
        assert_eq!(thumbnail("ice"), b"ICE");
    }

    #[test]
    fn test_node_dir_name_is_one_component() {
        assert_eq!(node_dir_name("莱万汀"), "莱万汀");
        assert_eq!(node_dir_name("a/b\\c"), "a_b_c");
        assert_eq!(node_dir_name(".."), "__");
    }

    #[tokio::test]
    async fn test_missing_image_is_skipped() {
        let temp = TempDir::new().unwrap();
        let source = legacy_source(temp.path());
        let mut ctx = context(&source, &temp.path().join("data"));

        ctx.services
            .classifications
            .create_node(&NewNode::named("fire", None, 100))
            .unwrap();
        write_file(
            &ctx.layout.classification_dir().join("_redirection.ini"),
            "fire = missing.png\n",
        );

        MigrateClassificationThumbnailsStep.run(&mut ctx).await.unwrap();
        assert_eq!(ctx.result.classification_thumbnails_linked, 0);
        assert!(ctx.services.classifications.get_node("fire").unwrap().unwrap().thumbnail.is_none());
    }

    #[tokio::test]
    async fn test_falls_back_to_environment_redirection() {
        let temp = TempDir::new().unwrap();
        let source = legacy_source(temp.path());
        let mut ctx = context(&source, &temp.path().join("data"));

        ctx.services
            .classifications
            .create_node(&NewNode::named("ice", None, 100))
            .unwrap();
        let env = ctx.layout.environment_dir();
        write_file(&env.join("ice.jpg"), b"jpg");
        write_file(&env.join("_redirection.ini"), "ice = ice.jpg\n");

        MigrateClassificationThumbnailsStep.run(&mut ctx).await.unwrap();
        assert_eq!(ctx.result.classification_thumbnails_linked, 1);
    }
}
