//! Archive container detection from file contents.
//!
//! Legacy archives are stored without extensions, so the format is sniffed
//! from the leading bytes only.

use crate::config::MigrationConfig;
use crate::error::{ModbayError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Magic bytes for archive format detection.
mod magic {
    pub const ZIP: &[u8] = &[0x50, 0x4B, 0x03, 0x04];
    /// Empty zip (end of central directory only)
    pub const ZIP_EMPTY: &[u8] = &[0x50, 0x4B, 0x05, 0x06];
    pub const SEVEN_Z: &[u8] = &[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C];
    pub const RAR4: &[u8] = b"Rar!\x1a\x07\x00";
    pub const RAR5: &[u8] = b"Rar!\x1a\x07\x01\x00";
    pub const GZIP: &[u8] = &[0x1F, 0x8B];
    pub const ZSTD: &[u8] = &[0x28, 0xB5, 0x2F, 0xFD];
    pub const XZ: &[u8] = &[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00];
    pub const BZIP2: &[u8] = b"BZh";
    pub const TAR_USTAR: &[u8] = b"ustar";
    pub const TAR_USTAR_OFFSET: usize = 257;
}

/// Container format of a mod archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    Zip,
    #[serde(rename = "7z")]
    SevenZip,
    Rar,
    Gzip,
    Zstd,
    Xz,
    Bzip2,
    Tar,
    Unknown,
}

impl ArchiveFormat {
    /// Canonical lowercase tag stored in the catalog.
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::SevenZip => "7z",
            ArchiveFormat::Rar => "rar",
            ArchiveFormat::Gzip => "gzip",
            ArchiveFormat::Zstd => "zstd",
            ArchiveFormat::Xz => "xz",
            ArchiveFormat::Bzip2 => "bzip2",
            ArchiveFormat::Tar => "tar",
            ArchiveFormat::Unknown => "unknown",
        }
    }

    /// Parse a stored tag; anything unrecognised is `Unknown`.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "zip" => ArchiveFormat::Zip,
            "7z" => ArchiveFormat::SevenZip,
            "rar" => ArchiveFormat::Rar,
            "gzip" => ArchiveFormat::Gzip,
            "zstd" => ArchiveFormat::Zstd,
            "xz" => ArchiveFormat::Xz,
            "bzip2" => ArchiveFormat::Bzip2,
            "tar" => ArchiveFormat::Tar,
            _ => ArchiveFormat::Unknown,
        }
    }
}

impl std::fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect the archive format from the leading bytes of a file.
pub fn detect_format(header: &[u8]) -> ArchiveFormat {
    if header.starts_with(magic::ZIP) || header.starts_with(magic::ZIP_EMPTY) {
        return ArchiveFormat::Zip;
    }
    if header.starts_with(magic::SEVEN_Z) {
        return ArchiveFormat::SevenZip;
    }
    if header.starts_with(magic::RAR5) || header.starts_with(magic::RAR4) {
        return ArchiveFormat::Rar;
    }
    if header.starts_with(magic::XZ) {
        return ArchiveFormat::Xz;
    }
    if header.starts_with(magic::ZSTD) {
        return ArchiveFormat::Zstd;
    }
    if header.starts_with(magic::GZIP) {
        return ArchiveFormat::Gzip;
    }
    if header.starts_with(magic::BZIP2) {
        return ArchiveFormat::Bzip2;
    }

    let ustar_end = magic::TAR_USTAR_OFFSET + magic::TAR_USTAR.len();
    if header.len() >= ustar_end && &header[magic::TAR_USTAR_OFFSET..ustar_end] == magic::TAR_USTAR
    {
        return ArchiveFormat::Tar;
    }

    ArchiveFormat::Unknown
}

/// Read the head of `path` and detect its archive format.
pub async fn detect_archive_format(path: &Path) -> Result<ArchiveFormat> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| ModbayError::io_with_path(e, path))?;

    let mut header = vec![0u8; MigrationConfig::FORMAT_SNIFF_BYTES];
    let mut filled = 0;
    while filled < header.len() {
        let read = file
            .read(&mut header[filled..])
            .await
            .map_err(|e| ModbayError::io_with_path(e, path))?;
        if read == 0 {
            break;
        }
        filled += read;
    }

    Ok(detect_format(&header[..filled]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_detect_common_formats() {
        assert_eq!(detect_format(b"PK\x03\x04rest"), ArchiveFormat::Zip);
        assert_eq!(detect_format(b"PK\x05\x06"), ArchiveFormat::Zip);
        assert_eq!(
            detect_format(&[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C, 0, 4]),
            ArchiveFormat::SevenZip
        );
        assert_eq!(detect_format(b"Rar!\x1a\x07\x00xx"), ArchiveFormat::Rar);
        assert_eq!(detect_format(b"Rar!\x1a\x07\x01\x00"), ArchiveFormat::Rar);
        assert_eq!(detect_format(&[0x1F, 0x8B, 0x08]), ArchiveFormat::Gzip);
        assert_eq!(detect_format(b"BZh91AY"), ArchiveFormat::Bzip2);
    }

    #[test]
    fn test_detect_tar_by_ustar_marker() {
        let mut header = vec![0u8; 512];
        header[257..262].copy_from_slice(b"ustar");
        assert_eq!(detect_format(&header), ArchiveFormat::Tar);
    }

    #[test]
    fn test_detect_unknown_and_short() {
        assert_eq!(detect_format(b""), ArchiveFormat::Unknown);
        assert_eq!(detect_format(b"PK"), ArchiveFormat::Unknown);
        assert_eq!(detect_format(b"plain text"), ArchiveFormat::Unknown);
    }

    #[test]
    fn test_tag_roundtrip_and_unknown_tag() {
        assert_eq!(ArchiveFormat::from_tag("7z"), ArchiveFormat::SevenZip);
        assert_eq!(ArchiveFormat::from_tag("lzh"), ArchiveFormat::Unknown);
        assert_eq!(
            serde_json::to_string(&ArchiveFormat::SevenZip).unwrap(),
            "\"7z\""
        );
    }

    #[tokio::test]
    async fn test_detect_archive_format_on_file_without_extension() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("3f2a9c");
        std::fs::write(&path, b"PK\x03\x04\x14\x00\x00\x00").unwrap();

        assert_eq!(detect_archive_format(&path).await.unwrap(), ArchiveFormat::Zip);
    }

    #[tokio::test]
    async fn test_detect_archive_format_missing_file() {
        let temp = TempDir::new().unwrap();
        assert!(detect_archive_format(&temp.path().join("nope")).await.is_err());
    }
}
