//! # Native-Path Adapter
//!
//! Everything lives under one private document root. Directory acquisition
//! creates missing entries, so requesting a directory that does not exist
//! silently creates it.
//!
//! `access` is stricter than a stat: the file probe must succeed and report a
//! non-zero size and a digest. Zero-byte or unreadable files count as absent.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::digest::{digest_bytes, digest_reader, digest_text, Digest, DigestAlgorithm};
use super::errors::{FsError, FsResult, InitError};
use super::facade::{DirEntry, FileContent, FileInfo, FileSystem, HashInput, InfoKind};
use super::probe::probe_media;
use super::{absorb, absorb_flag, log_failure, path};
use crate::config::StorageConfig;
use crate::selector::{Backend, Environment};

const BACKEND: &str = "native";

/// Native filesystem adapter
#[derive(Debug)]
pub struct NativePathAdapter {
    root: PathBuf,
    algorithm: DigestAlgorithm,
}

impl NativePathAdapter {
    /// Acquire (and create if needed) the document root
    pub async fn open_at(root: PathBuf, algorithm: DigestAlgorithm) -> Result<Self, InitError> {
        fs::create_dir_all(&root)
            .await
            .map_err(|e| InitError::RootUnavailable {
                path: root.display().to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self { root, algorithm })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> FsResult<PathBuf> {
        path::resolve(&self.root, path)
    }

    /// Directory entry, created along with its parents
    async fn dir_entry(&self, path: &str) -> FsResult<PathBuf> {
        let dir = self.resolve(path)?;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| FsError::from_io(path, e))?;
        Ok(dir)
    }

    /// File entry for writing; parent directories are created
    async fn file_entry(&self, path: &str) -> FsResult<PathBuf> {
        let file = self.resolve(path)?;
        if file == self.root {
            return Err(FsError::InvalidPath(path.to_string()));
        }

        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| FsError::from_io(path, e))?;
        }

        Ok(file)
    }

    /// File probe: size, streamed digest and modification time
    async fn probe_file(&self, path: &str) -> FsResult<FileInfo> {
        let file_path = self.resolve(path)?;
        let metadata = fs::metadata(&file_path)
            .await
            .map_err(|e| FsError::from_io(path, e))?;

        if !metadata.is_file() {
            return Err(FsError::NotFound(path.to_string()));
        }

        let mut file = fs::File::open(&file_path)
            .await
            .map_err(|e| FsError::from_io(path, e))?;
        let (digest, size) = digest_reader(self.algorithm, &mut file)
            .await
            .map_err(|e| FsError::from_io(path, e))?;

        Ok(FileInfo {
            size,
            digest: Some(digest),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            ..Default::default()
        })
    }

    /// Audio, video and image probes
    async fn probe_media_file(&self, path: &str, kind: InfoKind) -> FsResult<FileInfo> {
        let file_path = self.resolve(path)?;
        let bytes = fs::read(&file_path)
            .await
            .map_err(|e| FsError::from_io(path, e))?;

        let media = probe_media(kind, &bytes)
            .ok_or_else(|| FsError::UnsupportedProbe(format!("{} probe on {}", kind, path)))?;

        Ok(FileInfo {
            size: bytes.len() as u64,
            duration_secs: media.duration_secs,
            width: media.width,
            height: media.height,
            ..Default::default()
        })
    }

    async fn try_read(&self, path: &str) -> FsResult<FileContent> {
        let file = self.resolve(path)?;
        let bytes = fs::read(&file)
            .await
            .map_err(|e| FsError::from_io(path, e))?;
        Ok(FileContent::from_bytes(bytes))
    }

    async fn try_write(&self, path: &str, data: &FileContent) -> FsResult<String> {
        let file = self.file_entry(path).await?;

        // create() truncates, so the write replaces any previous content
        let mut handle = fs::File::create(&file)
            .await
            .map_err(|e| FsError::from_io(path, e))?;
        handle
            .write_all(data.as_bytes())
            .await
            .map_err(|e| FsError::from_io(path, e))?;
        handle.flush().await.map_err(|e| FsError::from_io(path, e))?;

        Ok(file.display().to_string())
    }

    async fn try_unlink(&self, path: &str) -> FsResult<()> {
        let file = self.resolve(path)?;
        fs::remove_file(&file)
            .await
            .map_err(|e| FsError::from_io(path, e))
    }

    async fn try_rmdir(&self, path: &str) -> FsResult<()> {
        let dir = self.resolve(path)?;
        if dir == self.root {
            return Err(FsError::InvalidPath(path.to_string()));
        }
        fs::remove_dir_all(&dir)
            .await
            .map_err(|e| FsError::from_io(path, e))
    }

    async fn try_readdir(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        let dir = self.dir_entry(path).await?;
        let mut reader = fs::read_dir(&dir)
            .await
            .map_err(|e| FsError::from_io(path, e))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| FsError::from_io(path, e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| FsError::from_io(path, e))?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: file_type.is_dir(),
            });
        }

        entries.sort();
        Ok(entries)
    }
}

impl FileSystem for NativePathAdapter {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn read_file(&self, path: &str) -> Option<FileContent> {
        absorb(BACKEND, "read_file", path, self.try_read(path).await)
    }

    async fn write_file(&self, path: &str, data: FileContent) -> Option<String> {
        absorb(BACKEND, "write_file", path, self.try_write(path, &data).await)
    }

    async fn mkdir(&self, path: &str) -> bool {
        self.ensure(path).await
    }

    async fn unlink(&self, path: &str) -> bool {
        absorb_flag(BACKEND, "unlink", path, self.try_unlink(path).await)
    }

    async fn rmdir(&self, path: &str) -> bool {
        absorb_flag(BACKEND, "rmdir", path, self.try_rmdir(path).await)
    }

    async fn ensure(&self, path: &str) -> bool {
        let result = self.dir_entry(path).await.map(|_| ());
        absorb_flag(BACKEND, "ensure", path, result)
    }

    async fn readdir(&self, path: &str) -> Vec<DirEntry> {
        absorb(BACKEND, "readdir", path, self.try_readdir(path).await).unwrap_or_default()
    }

    async fn access(&self, path: &str) -> bool {
        match self.probe_file(path).await {
            Ok(info) => info.size > 0 && info.digest.is_some_and(|d| !d.as_str().is_empty()),
            Err(e) => {
                log_failure(BACKEND, "access", path, &e);
                false
            }
        }
    }

    async fn read_file_info(&self, path: &str, kind: InfoKind) -> Option<FileInfo> {
        let result = match kind {
            InfoKind::File => self.probe_file(path).await,
            _ => self.probe_media_file(path, kind).await,
        };
        absorb(BACKEND, "read_file_info", path, result)
    }

    async fn read_file_to_hash(&self, input: HashInput<'_>) -> Option<Digest> {
        match input {
            HashInput::Path(path) => {
                let info = absorb(BACKEND, "read_file_to_hash", path, self.probe_file(path).await)?;
                info.digest
            }
            HashInput::Bytes(bytes) => Some(digest_bytes(self.algorithm, bytes)),
            HashInput::Text(text) => Some(digest_text(self.algorithm, text)),
        }
    }
}

impl Backend for NativePathAdapter {
    const ENVIRONMENT: Environment = Environment::Native;

    async fn open(config: &StorageConfig) -> Result<Self, InitError> {
        Self::open_at(config.native_root(), config.digest_algorithm).await
    }
}
