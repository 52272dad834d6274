//! Error types for the Modbay core.
//!
//! Only structural problems (missing source, unreadable store) travel as
//! `Err`. Per-item migration failures are collected into the migration
//! result instead, see [`crate::migration::MigrationResult`].

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the Modbay library.
#[derive(Debug, Error)]
pub enum ModbayError {
    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Path is not a directory: {0}")]
    NotADirectory(PathBuf),

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Legacy format errors
    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Not a legacy installation: {path} ({reason})")]
    InvalidSource { path: PathBuf, reason: String },

    // Migration lifecycle errors
    #[error("Migration cancelled")]
    MigrationCancelled,

    #[error("Migration not found: {migration_id}")]
    MigrationNotFound { migration_id: String },

    #[error("A migration is already running: {migration_id}")]
    MigrationInProgress { migration_id: String },

    #[error("Mod not found: {sha}")]
    ModNotFound { sha: String },

    // Validation errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Invalid parameters: {message}")]
    InvalidParams { message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for Modbay operations.
pub type Result<T> = std::result::Result<T, ModbayError>;

impl From<std::io::Error> for ModbayError {
    fn from(err: std::io::Error) -> Self {
        ModbayError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for ModbayError {
    fn from(err: serde_json::Error) -> Self {
        ModbayError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for ModbayError {
    fn from(err: rusqlite::Error) -> Self {
        ModbayError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl ModbayError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        ModbayError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a parse error for a legacy file.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ModbayError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Convert to a JSON-RPC error code.
    ///
    /// Custom error codes (application-defined, -32000 to -32099):
    /// - -32001: Migration or mod not found
    /// - -32002: Source is not a legacy installation
    /// - -32003: Migration already running
    /// - -32004: Cancelled by user
    /// - -32005: Validation error
    pub fn to_rpc_error_code(&self) -> i32 {
        match self {
            ModbayError::InvalidParams { .. } => -32602,

            ModbayError::MigrationNotFound { .. } | ModbayError::ModNotFound { .. } => -32001,

            ModbayError::InvalidSource { .. }
            | ModbayError::FileNotFound(_)
            | ModbayError::NotADirectory(_) => -32002,

            ModbayError::MigrationInProgress { .. } => -32003,

            ModbayError::MigrationCancelled => -32004,

            ModbayError::Validation { .. } | ModbayError::Parse { .. } => -32005,

            _ => -32603,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ModbayError::MigrationNotFound {
            migration_id: "abc".into(),
        };
        assert_eq!(err.to_string(), "Migration not found: abc");

        let err = ModbayError::parse("/tmp/index_1.json", "expected value");
        assert_eq!(
            err.to_string(),
            "Failed to parse /tmp/index_1.json: expected value"
        );
    }

    #[test]
    fn test_rpc_error_codes() {
        assert_eq!(ModbayError::MigrationCancelled.to_rpc_error_code(), -32004);
        assert_eq!(
            ModbayError::InvalidSource {
                path: PathBuf::from("/nope"),
                reason: "missing resources".into(),
            }
            .to_rpc_error_code(),
            -32002
        );
        assert_eq!(
            ModbayError::Other("boom".into()).to_rpc_error_code(),
            -32603
        );
    }

    #[test]
    fn test_io_with_path_keeps_path() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        match ModbayError::io_with_path(io, "/x/y") {
            ModbayError::Io { path, .. } => assert_eq!(path, Some(PathBuf::from("/x/y"))),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
