//! Step 2: merged legacy configuration into the settings file.

use super::MigrationStep;
use crate::error::Result;
use crate::legacy::parse_configuration;
use crate::migration::context::MigrationContext;
use crate::migration::types::{MigrationOptions, MigrationStage, StepOutcome};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::info;

pub struct MigrateConfigurationStep;

#[async_trait]
impl MigrationStep for MigrateConfigurationStep {
    fn stage(&self) -> MigrationStage {
        MigrationStage::MigrateConfiguration
    }

    fn is_enabled(&self, options: &MigrationOptions) -> bool {
        options.migrate_configuration
    }

    async fn run(&self, ctx: &mut MigrationContext) -> Result<StepOutcome> {
        let Some(configuration) = parse_configuration(
            &ctx.layout.local_configuration(),
            &ctx.layout.environment_configuration(),
        )
        .await?
        else {
            info!("No legacy configuration found, nothing to migrate");
            return Ok(StepOutcome::default());
        };

        let keys = configuration.len();
        ctx.report(format!("Migrating {} configuration keys", keys), 0, 1);

        let mut values = Map::new();
        values.insert("legacy".to_string(), Value::Object(configuration.values));
        values.insert(
            "migratedFrom".to_string(),
            Value::String(ctx.layout.source().to_string_lossy().to_string()),
        );
        values.insert(
            "environment".to_string(),
            Value::String(ctx.layout.environment().to_string()),
        );
        ctx.services.settings.update(values)?;

        ctx.result.configuration_keys_migrated += keys;
        ctx.report(format!("Migrated {} configuration keys", keys), 1, 1);
        info!(
            "Migrated {} configuration keys from {} files",
            keys,
            configuration.sources.len()
        );
        Ok(StepOutcome::processed(keys))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::context::fixtures::{context, legacy_source, write_file};
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_environment_overrides_local() {
        let temp = TempDir::new().unwrap();
        let source = legacy_source(temp.path());
        let data = temp.path().join("data");
        let mut ctx = context(&source, &data);

        write_file(
            &ctx.layout.local_configuration(),
            r#"{"gamePath": "/local", "ui": {"lang": "zh", "scale": 1}}"#,
        );
        write_file(
            &ctx.layout.environment_configuration(),
            "gamePath = /env\n",
        );

        let outcome = MigrateConfigurationStep.run(&mut ctx).await.unwrap();
        assert_eq!(outcome.items_processed, 2);
        assert_eq!(ctx.result.configuration_keys_migrated, 2);

        let settings = ctx.services.settings.load().unwrap().unwrap();
        assert_eq!(settings["legacy"]["gamePath"], json!("/env"));
        assert_eq!(settings["legacy"]["ui"]["lang"], json!("zh"));
        assert_eq!(settings["environment"], json!("default"));
    }

    #[tokio::test]
    async fn test_no_configuration_is_noop() {
        let temp = TempDir::new().unwrap();
        let source = legacy_source(temp.path());
        let data = temp.path().join("data");
        let mut ctx = context(&source, &data);

        let outcome = MigrateConfigurationStep.run(&mut ctx).await.unwrap();
        assert_eq!(outcome.items_processed, 0);
        assert!(ctx.services.settings.load().unwrap().is_none());
    }
}
