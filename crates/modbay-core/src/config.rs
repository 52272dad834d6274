//! Centralized configuration for Modbay.
//!
//! Names of every directory and file the migration reads from a legacy
//! installation or writes into the Modbay data root.

use std::path::{Path, PathBuf};

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "Modbay";
    pub const DATA_DIR_NAME: &'static str = "modbay";
}

/// Layout of the Modbay data root.
pub struct PathsConfig;

impl PathsConfig {
    pub const DATABASE_FILENAME: &'static str = "modbay.sqlite";
    pub const SETTINGS_FILENAME: &'static str = "settings.json";
    pub const ARCHIVES_DIR_NAME: &'static str = "archives";
    pub const PREVIEWS_DIR_NAME: &'static str = "previews";
    pub const THUMBNAILS_DIR_NAME: &'static str = "thumbnails";

    pub fn database_path(data_root: &Path) -> PathBuf {
        data_root.join(Self::DATABASE_FILENAME)
    }

    pub fn settings_path(data_root: &Path) -> PathBuf {
        data_root.join(Self::SETTINGS_FILENAME)
    }

    pub fn archives_dir(data_root: &Path) -> PathBuf {
        data_root.join(Self::ARCHIVES_DIR_NAME)
    }

    pub fn previews_dir(data_root: &Path) -> PathBuf {
        data_root.join(Self::PREVIEWS_DIR_NAME)
    }

    pub fn thumbnails_dir(data_root: &Path) -> PathBuf {
        data_root.join(Self::THUMBNAILS_DIR_NAME)
    }
}

/// On-disk layout of a legacy installation.
///
/// ```text
/// {source}/
///   resources/
///     mods/{sha}            archives, flat, no extension
///     preview/{sha}[_n].png preview images
///   local/configuration
///   home/{env}/
///     configuration
///     classification/{category}   one object per line
///     classification/_redirection.ini
///     modsIndex/index_*.json
/// ```
#[derive(Debug, Clone)]
pub struct LegacyLayout {
    source: PathBuf,
    environment: String,
}

impl LegacyLayout {
    pub const RESOURCES_DIR_NAME: &'static str = "resources";
    pub const ARCHIVES_DIR_NAME: &'static str = "mods";
    pub const PREVIEWS_DIR_NAME: &'static str = "preview";
    pub const HOME_DIR_NAME: &'static str = "home";
    pub const LOCAL_DIR_NAME: &'static str = "local";
    pub const CLASSIFICATION_DIR_NAME: &'static str = "classification";
    pub const MODS_INDEX_DIR_NAME: &'static str = "modsIndex";
    pub const CONFIGURATION_FILENAME: &'static str = "configuration";
    pub const REDIRECTION_FILENAME: &'static str = "_redirection.ini";

    pub fn new(source: impl Into<PathBuf>, environment: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            environment: environment.into(),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn resources_dir(&self) -> PathBuf {
        self.source.join(Self::RESOURCES_DIR_NAME)
    }

    pub fn archives_dir(&self) -> PathBuf {
        self.resources_dir().join(Self::ARCHIVES_DIR_NAME)
    }

    pub fn previews_dir(&self) -> PathBuf {
        self.resources_dir().join(Self::PREVIEWS_DIR_NAME)
    }

    pub fn environment_dir(&self) -> PathBuf {
        self.source.join(Self::HOME_DIR_NAME).join(&self.environment)
    }

    pub fn classification_dir(&self) -> PathBuf {
        self.environment_dir().join(Self::CLASSIFICATION_DIR_NAME)
    }

    /// Candidate locations of the redirection file, most specific first.
    pub fn redirection_candidates(&self) -> [PathBuf; 2] {
        [
            self.classification_dir().join(Self::REDIRECTION_FILENAME),
            self.environment_dir().join(Self::REDIRECTION_FILENAME),
        ]
    }

    pub fn mods_index_dir(&self) -> PathBuf {
        self.environment_dir().join(Self::MODS_INDEX_DIR_NAME)
    }

    pub fn local_configuration(&self) -> PathBuf {
        self.source
            .join(Self::LOCAL_DIR_NAME)
            .join(Self::CONFIGURATION_FILENAME)
    }

    pub fn environment_configuration(&self) -> PathBuf {
        self.environment_dir().join(Self::CONFIGURATION_FILENAME)
    }
}

/// Migration tuning constants.
pub struct MigrationConfig;

impl MigrationConfig {
    pub const DEFAULT_ENVIRONMENT: &'static str = "default";
    /// Bytes read from the start of an archive for format sniffing.
    pub const FORMAT_SNIFF_BYTES: usize = 512;
    pub const SUPPORTED_IMAGE_EXTENSIONS: &'static [&'static str] =
        &["png", "jpg", "jpeg", "webp", "gif", "bmp"];
    /// Priority given to category (root) nodes.
    pub const CATEGORY_PRIORITY: i64 = 100;
    /// Priority given to object (child) nodes.
    pub const OBJECT_PRIORITY: i64 = 50;
    /// Finished runs kept by the progress tracker.
    pub const FINISHED_RUNS_KEPT: usize = 32;
}
