//! # Sandbox File Manager
//!
//! The applet runtime's filesystem: one sandbox directory with a byte quota.
//! Paths that would leave the sandbox are permission errors. A write that
//! would push total usage past the quota is refused before anything is
//! written.
//!
//! Calls map one-to-one onto the runtime's file manager, including its
//! quirks: `mkdir` of an existing directory fails, `write_file` does not
//! create parent directories.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::sync::Mutex;

use crate::fs::errors::{FsError, FsResult, InitError};
use crate::fs::facade::{DirEntry, InfoKind};
use crate::fs::path;
use crate::fs::probe::{probe_media, MediaInfo};

/// Result of `stat`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxStats {
    pub size: u64,
    pub is_dir: bool,
    pub modified: Option<DateTime<Utc>>,
}

/// Quota-limited sandbox filesystem
#[derive(Debug)]
pub struct SandboxFileManager {
    root: PathBuf,
    quota_bytes: u64,
    /// Bytes currently stored; the lock also serializes quota checks
    usage: Mutex<u64>,
}

impl SandboxFileManager {
    /// Open the sandbox, creating it if needed and measuring current usage
    pub async fn open(root: PathBuf, quota_bytes: u64) -> Result<Self, InitError> {
        let unavailable = |reason: String| InitError::RootUnavailable {
            path: root.display().to_string(),
            reason,
        };

        fs::create_dir_all(&root)
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        let usage = tree_size(&root)
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        Ok(Self {
            root,
            quota_bytes,
            usage: Mutex::new(usage),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Bytes currently stored in the sandbox
    pub async fn usage(&self) -> u64 {
        *self.usage.lock().await
    }

    fn resolve(&self, path: &str) -> FsResult<PathBuf> {
        path::resolve(&self.root, path).map_err(|_| FsError::PermissionDenied(path.to_string()))
    }

    pub async fn read_file(&self, path: &str) -> FsResult<Vec<u8>> {
        let file = self.resolve(path)?;
        fs::read(&file).await.map_err(|e| FsError::from_io(path, e))
    }

    /// Write a file; the parent directory must already exist
    pub async fn write_file(&self, path: &str, data: &[u8]) -> FsResult<()> {
        let file = self.resolve(path)?;
        if file == self.root {
            return Err(FsError::InvalidPath(path.to_string()));
        }

        let mut usage = self.usage.lock().await;

        let previous = match fs::metadata(&file).await {
            Ok(meta) if meta.is_dir() => return Err(FsError::AlreadyExists(path.to_string())),
            Ok(meta) => meta.len(),
            Err(_) => 0,
        };

        let new_usage = usage.saturating_sub(previous) + data.len() as u64;
        if new_usage > self.quota_bytes {
            return Err(FsError::QuotaExceeded {
                requested: data.len() as u64,
                available: self.quota_bytes.saturating_sub(usage.saturating_sub(previous)),
            });
        }

        fs::write(&file, data)
            .await
            .map_err(|e| FsError::from_io(path, e))?;
        *usage = new_usage;

        Ok(())
    }

    /// Create a directory. Fails with `AlreadyExists` when it is there.
    pub async fn mkdir(&self, path: &str, recursive: bool) -> FsResult<()> {
        let dir = self.resolve(path)?;
        if fs::metadata(&dir).await.is_ok() {
            return Err(FsError::AlreadyExists(path.to_string()));
        }

        let result = if recursive {
            fs::create_dir_all(&dir).await
        } else {
            fs::create_dir(&dir).await
        };
        result.map_err(|e| FsError::from_io(path, e))
    }

    pub async fn rmdir(&self, path: &str, recursive: bool) -> FsResult<()> {
        let dir = self.resolve(path)?;
        if dir == self.root {
            return Err(FsError::PermissionDenied(path.to_string()));
        }

        let mut usage = self.usage.lock().await;
        let freed = tree_size(&dir).await.map_err(|e| FsError::from_io(path, e))?;

        let result = if recursive {
            fs::remove_dir_all(&dir).await
        } else {
            fs::remove_dir(&dir).await
        };
        result.map_err(|e| FsError::from_io(path, e))?;
        *usage = usage.saturating_sub(freed);

        Ok(())
    }

    pub async fn unlink(&self, path: &str) -> FsResult<()> {
        let file = self.resolve(path)?;
        let mut usage = self.usage.lock().await;

        let meta = fs::metadata(&file)
            .await
            .map_err(|e| FsError::from_io(path, e))?;
        if meta.is_dir() {
            return Err(FsError::InvalidPath(path.to_string()));
        }

        fs::remove_file(&file)
            .await
            .map_err(|e| FsError::from_io(path, e))?;
        *usage = usage.saturating_sub(meta.len());

        Ok(())
    }

    pub async fn readdir(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        let dir = self.resolve(path)?;
        let mut reader = fs::read_dir(&dir)
            .await
            .map_err(|e| FsError::from_io(path, e))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| FsError::from_io(path, e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .map_err(|e| FsError::from_io(path, e))?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir,
            });
        }

        entries.sort();
        Ok(entries)
    }

    /// Generic existence probe (files and directories)
    pub async fn access(&self, path: &str) -> FsResult<()> {
        let target = self.resolve(path)?;
        fs::metadata(&target)
            .await
            .map(|_| ())
            .map_err(|e| FsError::from_io(path, e))
    }

    pub async fn stat(&self, path: &str) -> FsResult<SandboxStats> {
        let target = self.resolve(path)?;
        let meta = fs::metadata(&target)
            .await
            .map_err(|e| FsError::from_io(path, e))?;

        Ok(SandboxStats {
            size: if meta.is_dir() { 0 } else { meta.len() },
            is_dir: meta.is_dir(),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
        })
    }

    /// Image or video probe. The runtime offers no audio probe.
    pub async fn media_info(&self, path: &str, kind: InfoKind) -> FsResult<MediaInfo> {
        if !matches!(kind, InfoKind::Image | InfoKind::Video) {
            return Err(FsError::UnsupportedProbe(format!("{} probe", kind)));
        }

        let bytes = self.read_file(path).await?;
        probe_media(kind, &bytes)
            .ok_or_else(|| FsError::UnsupportedProbe(format!("{} probe on {}", kind, path)))
    }
}

/// Total size of the regular files under `dir`
async fn tree_size(dir: &Path) -> std::io::Result<u64> {
    let mut total = 0;
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut reader = fs::read_dir(&current).await?;
        while let Some(entry) = reader.next_entry().await? {
            let meta = entry.metadata().await?;
            if meta.is_dir() {
                pending.push(entry.path());
            } else {
                total += meta.len();
            }
        }
    }

    Ok(total)
}
