//! # File Storage Errors
//!
//! These never cross the facade. Adapters use them internally with `?` and
//! collapse them into the empty/false result at the public boundary.

use thiserror::Error;

/// Result type for adapter internals
pub type FsResult<T> = Result<T, FsError>;

/// Internal adapter errors
#[derive(Debug, Clone, Error)]
pub enum FsError {
    // Addressing errors
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    // Sandbox errors
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Quota exceeded: {requested} bytes requested, {available} available")]
    QuotaExceeded { requested: u64, available: u64 },

    // Record store errors
    #[error("Constraint violation on index {index}: {key}")]
    ConstraintViolation { index: String, key: String },

    #[error("Database error: {0}")]
    Database(String),

    // Content errors
    #[error("Unsupported probe: {0}")]
    UnsupportedProbe(String),

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    // I/O errors
    #[error("I/O error: {0}")]
    IoError(String),
}

impl FsError {
    /// Map an I/O error, keeping the missing-resource case distinguishable
    pub fn from_io(path: &str, e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => FsError::NotFound(path.to_string()),
            std::io::ErrorKind::AlreadyExists => FsError::AlreadyExists(path.to_string()),
            std::io::ErrorKind::PermissionDenied => FsError::PermissionDenied(path.to_string()),
            _ => FsError::IoError(e.to_string()),
        }
    }

    /// Short machine-readable code used in log lines
    pub fn code(&self) -> &'static str {
        match self {
            FsError::NotFound(_) => "NOT_FOUND",
            FsError::AlreadyExists(_) => "ALREADY_EXISTS",
            FsError::InvalidPath(_) => "INVALID_PATH",
            FsError::PermissionDenied(_) => "PERMISSION_DENIED",
            FsError::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            FsError::ConstraintViolation { .. } => "CONSTRAINT_VIOLATION",
            FsError::Database(_) => "DATABASE",
            FsError::UnsupportedProbe(_) => "UNSUPPORTED_PROBE",
            FsError::InvalidJson(_) => "INVALID_JSON",
            FsError::IoError(_) => "IO",
        }
    }
}

impl From<serde_json::Error> for FsError {
    fn from(e: serde_json::Error) -> Self {
        FsError::InvalidJson(e.to_string())
    }
}

/// Backend initialization failure. Fatal for the storage subsystem.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("Cannot acquire filesystem root {path}: {reason}")]
    RootUnavailable { path: String, reason: String },

    #[error("Cannot open database {name} (version {version}): {reason}")]
    DatabaseUnavailable {
        name: String,
        version: u32,
        reason: String,
    },
}
