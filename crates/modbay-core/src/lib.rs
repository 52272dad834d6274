//! Modbay Core - headless library behind the Modbay mod manager.
//!
//! Holds the classification tree, the mod catalog and the migration
//! pipeline that imports a legacy installation into a Modbay data root.
//!
//! # Example
//!
//! ```rust,ignore
//! use modbay_core::{MigrationOptions, ModbayApi};
//!
//! #[tokio::main]
//! async fn main() -> modbay_core::Result<()> {
//!     let api = ModbayApi::new("/path/to/data")?;
//!
//!     let analysis = api.analyze_source("/path/to/legacy", None).await?;
//!     println!("Found {} mod records", analysis.mod_records);
//!
//!     let result = api.migrate(MigrationOptions::new("/path/to/legacy")).await?;
//!     println!("Migrated {} mods, {} errors", result.mods_migrated, result.errors.len());
//!
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod catalog;
pub mod classification;
pub mod config;
pub mod error;
pub mod files;
pub mod legacy;
pub mod migration;
pub mod settings;

mod api;
mod db;

// Re-export commonly used types
pub use api::ModbayApi;
pub use cancel::CancellationToken;
pub use catalog::{ModCatalog, ModCatalogEntry, SqliteModCatalog};
pub use classification::{ClassificationNode, ClassificationStore, SqliteClassificationStore};
pub use db::Database;
pub use error::{ModbayError, Result};
pub use files::ArchiveFormat;
pub use migration::{
    ArchiveHandling, MigrationOptions, MigrationProgress, MigrationResult, MigrationStage,
    Migrator,
};
