//! File operations used by the migration steps.

use super::archive_format::{self, ArchiveFormat};
use crate::error::{ModbayError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// How a file actually reached its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Copied,
    Moved,
    Linked,
}

/// Filesystem collaborator for the migration pipeline.
#[async_trait]
pub trait FileService: Send + Sync {
    /// Copy `source` to `target`, creating the target's parent directory.
    ///
    /// The bytes go to a temp file beside `target` that is then renamed over
    /// it, so an existing target (possibly a hard link to `source`) is
    /// replaced, never truncated.
    async fn copy_file(&self, source: &Path, target: &Path) -> Result<()>;

    /// Move `source` to `target`; falls back to copy + delete across devices.
    async fn move_file(&self, source: &Path, target: &Path) -> Result<()>;

    /// Hard-link `source` to `target`, copying when linking is not possible.
    async fn hard_link_or_copy(&self, source: &Path, target: &Path) -> Result<TransferKind>;

    /// Copy a directory tree, returning the number of files copied.
    async fn copy_directory(&self, source: &Path, target: &Path) -> Result<usize>;

    async fn ensure_directory_exists(&self, path: &Path) -> Result<()>;

    async fn remove_file(&self, path: &Path) -> Result<()>;

    async fn detect_archive_format(&self, path: &Path) -> Result<ArchiveFormat>;

    /// Whether both files hold the same bytes.
    async fn same_contents(&self, a: &Path, b: &Path) -> Result<bool>;
}

/// Sibling of `target` that a copy is staged in.
fn staging_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.{}.part", name, std::process::id()))
}

const COMPARE_CHUNK: usize = 64 * 1024;

/// [`FileService`] backed by the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct LocalFileService;

impl LocalFileService {
    pub fn new() -> Self {
        Self
    }

    async fn ensure_parent(&self, target: &Path) -> Result<()> {
        if let Some(parent) = target.parent() {
            self.ensure_directory_exists(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl FileService for LocalFileService {
    async fn copy_file(&self, source: &Path, target: &Path) -> Result<()> {
        if !tokio::fs::try_exists(source).await.unwrap_or(false) {
            return Err(ModbayError::FileNotFound(source.to_path_buf()));
        }
        self.ensure_parent(target).await?;

        let staging = staging_path(target);
        if let Err(e) = tokio::fs::copy(source, &staging).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(ModbayError::Io {
                message: format!(
                    "Failed to copy {} to {}: {}",
                    source.display(),
                    target.display(),
                    e
                ),
                path: Some(source.to_path_buf()),
                source: Some(e),
            });
        }
        if let Err(e) = tokio::fs::rename(&staging, target).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(ModbayError::Io {
                message: format!(
                    "Failed to rename {} to {}",
                    staging.display(),
                    target.display()
                ),
                path: Some(target.to_path_buf()),
                source: Some(e),
            });
        }
        debug!("Copied {} -> {}", source.display(), target.display());
        Ok(())
    }

    async fn move_file(&self, source: &Path, target: &Path) -> Result<()> {
        if !tokio::fs::try_exists(source).await.unwrap_or(false) {
            return Err(ModbayError::FileNotFound(source.to_path_buf()));
        }
        self.ensure_parent(target).await?;

        if tokio::fs::rename(source, target).await.is_ok() {
            debug!("Moved {} -> {}", source.display(), target.display());
            return Ok(());
        }

        // Rename fails across filesystems
        self.copy_file(source, target).await?;
        self.remove_file(source).await?;
        debug!("Moved (copy + delete) {} -> {}", source.display(), target.display());
        Ok(())
    }

    async fn hard_link_or_copy(&self, source: &Path, target: &Path) -> Result<TransferKind> {
        if !tokio::fs::try_exists(source).await.unwrap_or(false) {
            return Err(ModbayError::FileNotFound(source.to_path_buf()));
        }
        self.ensure_parent(target).await?;

        match tokio::fs::hard_link(source, target).await {
            Ok(()) => Ok(TransferKind::Linked),
            Err(e) => {
                debug!(
                    "Hard link {} failed ({}), copying instead",
                    source.display(),
                    e
                );
                self.copy_file(source, target).await?;
                Ok(TransferKind::Copied)
            }
        }
    }

    async fn copy_directory(&self, source: &Path, target: &Path) -> Result<usize> {
        if !source.is_dir() {
            return Err(ModbayError::NotADirectory(source.to_path_buf()));
        }
        self.ensure_directory_exists(target).await?;

        let mut copied = 0;
        for entry in WalkDir::new(source).min_depth(1).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", source.display(), e);
                    continue;
                }
            };
            let relative = match entry.path().strip_prefix(source) {
                Ok(relative) => relative,
                Err(_) => continue,
            };
            let destination = target.join(relative);

            if entry.file_type().is_dir() {
                self.ensure_directory_exists(&destination).await?;
            } else if entry.file_type().is_file() {
                self.copy_file(entry.path(), &destination).await?;
                copied += 1;
            }
        }

        Ok(copied)
    }

    async fn ensure_directory_exists(&self, path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| ModbayError::Io {
                message: format!("Failed to create directory {}", path.display()),
                path: Some(path.to_path_buf()),
                source: Some(e),
            })
    }

    async fn remove_file(&self, path: &Path) -> Result<()> {
        tokio::fs::remove_file(path)
            .await
            .map_err(|e| ModbayError::io_with_path(e, path))
    }

    async fn detect_archive_format(&self, path: &Path) -> Result<ArchiveFormat> {
        archive_format::detect_archive_format(path).await
    }

    async fn same_contents(&self, a: &Path, b: &Path) -> Result<bool> {
        let meta_a = tokio::fs::metadata(a)
            .await
            .map_err(|e| ModbayError::io_with_path(e, a))?;
        let meta_b = tokio::fs::metadata(b)
            .await
            .map_err(|e| ModbayError::io_with_path(e, b))?;
        if !meta_a.is_file() || !meta_b.is_file() || meta_a.len() != meta_b.len() {
            return Ok(false);
        }

        let mut file_a = tokio::fs::File::open(a)
            .await
            .map_err(|e| ModbayError::io_with_path(e, a))?;
        let mut file_b = tokio::fs::File::open(b)
            .await
            .map_err(|e| ModbayError::io_with_path(e, b))?;
        let mut buf_a = vec![0u8; COMPARE_CHUNK];
        let mut buf_b = vec![0u8; COMPARE_CHUNK];
        loop {
            let read = file_a
                .read(&mut buf_a)
                .await
                .map_err(|e| ModbayError::io_with_path(e, a))?;
            if read == 0 {
                return Ok(true);
            }
            if file_b.read_exact(&mut buf_b[..read]).await.is_err() {
                return Ok(false);
            }
            if buf_a[..read] != buf_b[..read] {
                return Ok(false);
            }
        }
    }
}
