//! Image capabilities used to filter preview and thumbnail files.

use crate::config::MigrationConfig;
use std::path::Path;

pub trait ImageService: Send + Sync {
    /// Lowercase extensions, without the leading dot.
    fn supported_image_extensions(&self) -> Vec<String>;

    /// Whether `path` has a supported extension (case-insensitive).
    fn is_supported_image(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        let ext = ext.to_lowercase();
        self.supported_image_extensions().iter().any(|s| *s == ext)
    }
}

/// Accepts the common raster formats.
#[derive(Debug, Clone, Default)]
pub struct DefaultImageService;

impl ImageService for DefaultImageService {
    fn supported_image_extensions(&self) -> Vec<String> {
        MigrationConfig::SUPPORTED_IMAGE_EXTENSIONS
            .iter()
            .map(|ext| ext.to_string())
            .collect()
    }
}
