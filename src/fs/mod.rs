//! # Unified File Storage
//!
//! One asynchronous storage contract over three incompatible backends:
//!
//! - [`NativePathAdapter`]: a private document root on the native filesystem
//! - [`BrowserStoreAdapter`]: a versioned record database plus a flat string store
//! - [`AppletPathAdapter`]: a sandboxed, quota-limited applet filesystem
//!
//! All three implement [`FileSystem`]. Failures resolve to empty values.

pub mod applet;
pub mod browser;
pub mod digest;
pub mod errors;
pub mod facade;
pub mod native;
pub mod path;
pub mod probe;

pub use applet::{AppletPathAdapter, SandboxFileManager};
pub use browser::{BrowserStoreAdapter, DatabaseFactory, FileRecord, StringStore};
pub use digest::{Digest, DigestAlgorithm, Hasher};
pub use errors::{FsError, FsResult, InitError};
pub use facade::{DirEntry, FileContent, FileInfo, FileSystem, HashInput, InfoKind};
pub use native::NativePathAdapter;

use crate::observability::{Event, Logger};

/// Log an absorbed failure. Missing resources are routine and log at TRACE.
pub(crate) fn log_failure(backend: &str, op: &str, path: &str, error: &FsError) {
    let message = error.to_string();
    let fields = [
        ("backend", backend),
        ("op", op),
        ("path", path),
        ("code", error.code()),
        ("error", message.as_str()),
    ];

    match error {
        FsError::NotFound(_) => Logger::trace(Event::OpFailed.as_str(), &fields),
        FsError::ConstraintViolation { .. } => {
            Logger::warn(Event::ConstraintViolation.as_str(), &fields)
        }
        FsError::PermissionDenied(_) | FsError::QuotaExceeded { .. } => {
            Logger::warn(Event::SandboxDenied.as_str(), &fields)
        }
        _ => Logger::warn(Event::OpFailed.as_str(), &fields),
    }
}

/// Collapse an internal result into the facade's empty-on-failure form
pub(crate) fn absorb<T>(backend: &str, op: &str, path: &str, result: FsResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            log_failure(backend, op, path, &e);
            None
        }
    }
}

/// Boolean form of [`absorb`]
pub(crate) fn absorb_flag(backend: &str, op: &str, path: &str, result: FsResult<()>) -> bool {
    absorb(backend, op, path, result).is_some()
}
