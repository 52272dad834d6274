//! Filesystem and image collaborators.

mod archive_format;
mod image;
mod service;

pub use archive_format::{detect_archive_format, detect_format, ArchiveFormat};
pub use image::{DefaultImageService, ImageService};
pub use service::{FileService, LocalFileService, TransferKind};
