//! # Applet-Path Adapter
//!
//! Facade over the applet runtime's [`SandboxFileManager`]. The runtime has
//! no digest probe, so hashing a stored file reads it fully into memory and
//! hashes it here.
//!
//! `ensure` is `access` followed by `mkdir`, not an atomic create-if-absent.
//! Two concurrent `ensure` calls on one path can both see it missing; the
//! loser's `mkdir` then fails with `AlreadyExists`, which `mkdir` treats as
//! success once `stat` confirms a directory, so both still resolve `true`.
//! A regular file at the path makes both `mkdir` and `ensure` resolve `false`.

mod sandbox;

pub use sandbox::{SandboxFileManager, SandboxStats};

use super::digest::{digest_text, Digest, DigestAlgorithm, Hasher, STREAM_CHUNK_SIZE};
use super::errors::{FsError, InitError};
use super::facade::{DirEntry, FileContent, FileInfo, FileSystem, HashInput, InfoKind};
use super::{absorb, absorb_flag, log_failure};
use crate::config::StorageConfig;
use crate::selector::{Backend, Environment};

const BACKEND: &str = "applet";

/// Applet sandbox adapter
#[derive(Debug)]
pub struct AppletPathAdapter {
    manager: SandboxFileManager,
    algorithm: DigestAlgorithm,
}

impl AppletPathAdapter {
    pub fn new(manager: SandboxFileManager, algorithm: DigestAlgorithm) -> Self {
        Self { manager, algorithm }
    }

    /// The runtime file manager underneath
    pub fn manager(&self) -> &SandboxFileManager {
        &self.manager
    }

    /// Whether `path` exists as a directory. A file there is logged as
    /// `AlreadyExists` against `op`.
    async fn is_dir(&self, op: &str, path: &str) -> bool {
        match self.manager.stat(path).await {
            Ok(stats) if stats.is_dir => true,
            Ok(_) => {
                log_failure(BACKEND, op, path, &FsError::AlreadyExists(path.to_string()));
                false
            }
            Err(e) => {
                log_failure(BACKEND, op, path, &e);
                false
            }
        }
    }

    fn hash_bytes(&self, bytes: &[u8]) -> Digest {
        let mut hasher = Hasher::new(self.algorithm);
        for chunk in bytes.chunks(STREAM_CHUNK_SIZE) {
            hasher.update(chunk);
        }
        hasher.finalize()
    }
}

impl FileSystem for AppletPathAdapter {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn read_file(&self, path: &str) -> Option<FileContent> {
        let bytes = absorb(BACKEND, "read_file", path, self.manager.read_file(path).await)?;
        Some(FileContent::from_bytes(bytes))
    }

    async fn write_file(&self, path: &str, data: FileContent) -> Option<String> {
        let result = self.manager.write_file(path, data.as_bytes()).await;
        absorb(BACKEND, "write_file", path, result).map(|_| path.to_string())
    }

    async fn mkdir(&self, path: &str) -> bool {
        match self.manager.mkdir(path, true).await {
            Ok(()) => true,
            Err(FsError::AlreadyExists(_)) => self.is_dir("mkdir", path).await,
            Err(e) => {
                log_failure(BACKEND, "mkdir", path, &e);
                false
            }
        }
    }

    async fn unlink(&self, path: &str) -> bool {
        absorb_flag(BACKEND, "unlink", path, self.manager.unlink(path).await)
    }

    async fn rmdir(&self, path: &str) -> bool {
        absorb_flag(BACKEND, "rmdir", path, self.manager.rmdir(path, true).await)
    }

    async fn ensure(&self, path: &str) -> bool {
        if self.access(path).await {
            return self.is_dir("ensure", path).await;
        }
        self.mkdir(path).await
    }

    async fn readdir(&self, path: &str) -> Vec<DirEntry> {
        absorb(BACKEND, "readdir", path, self.manager.readdir(path).await).unwrap_or_default()
    }

    async fn access(&self, path: &str) -> bool {
        absorb_flag(BACKEND, "access", path, self.manager.access(path).await)
    }

    async fn read_file_info(&self, path: &str, kind: InfoKind) -> Option<FileInfo> {
        match kind {
            InfoKind::File => {
                let stats = absorb(BACKEND, "read_file_info", path, self.manager.stat(path).await)?;
                Some(FileInfo {
                    size: stats.size,
                    modified: stats.modified,
                    ..Default::default()
                })
            }
            _ => {
                let media =
                    absorb(BACKEND, "read_file_info", path, self.manager.media_info(path, kind).await)?;
                let stats = absorb(BACKEND, "read_file_info", path, self.manager.stat(path).await)?;
                Some(FileInfo {
                    size: stats.size,
                    modified: stats.modified,
                    duration_secs: media.duration_secs,
                    width: media.width,
                    height: media.height,
                    ..Default::default()
                })
            }
        }
    }

    async fn read_file_to_hash(&self, input: HashInput<'_>) -> Option<Digest> {
        match input {
            HashInput::Path(path) => {
                let bytes =
                    absorb(BACKEND, "read_file_to_hash", path, self.manager.read_file(path).await)?;
                Some(self.hash_bytes(&bytes))
            }
            HashInput::Bytes(bytes) => Some(self.hash_bytes(bytes)),
            HashInput::Text(text) => Some(digest_text(self.algorithm, text)),
        }
    }
}

impl Backend for AppletPathAdapter {
    const ENVIRONMENT: Environment = Environment::Applet;

    async fn open(config: &StorageConfig) -> Result<Self, InitError> {
        let manager = SandboxFileManager::open(config.applet_root(), config.applet.quota_bytes).await?;
        Ok(Self::new(manager, config.digest_algorithm))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::digest::digest_bytes;
    use crate::fs::probe::fixtures;
    use tempfile::TempDir;

    async fn create_test_adapter(quota: u64) -> (AppletPathAdapter, TempDir) {
        let temp = TempDir::new().unwrap();
        let manager = SandboxFileManager::open(temp.path().join("usr"), quota)
            .await
            .unwrap();
        (AppletPathAdapter::new(manager, DigestAlgorithm::Md5), temp)
    }

    #[tokio::test]
    async fn test_mkdir_idempotent() {
        let (fs, _temp) = create_test_adapter(1024).await;

        assert!(fs.mkdir("a/b").await);
        fs.write_file("a/b/keep.txt", "keep".into()).await.unwrap();
        assert!(fs.mkdir("a/b").await);
        assert!(fs.ensure("a/b").await);

        assert_eq!(fs.read_file("a/b/keep.txt").await, Some(FileContent::Text("keep".into())));
    }

    #[tokio::test]
    async fn test_concurrent_ensure() {
        let (fs, _temp) = create_test_adapter(1024).await;

        let (a, b) = tokio::join!(fs.ensure("race"), fs.ensure("race"));
        assert!(a && b);
        assert!(fs.access("race").await);
    }

    #[tokio::test]
    async fn test_quota_surfaces_as_empty() {
        let (fs, _temp) = create_test_adapter(4).await;

        assert_eq!(fs.write_file("big.txt", "too large".into()).await, None);
        assert!(!fs.access("big.txt").await);
    }

    #[tokio::test]
    async fn test_mkdir_over_file_fails() {
        let (fs, _temp) = create_test_adapter(1024).await;
        fs.write_file("logs", "x".into()).await.unwrap();

        assert!(!fs.mkdir("logs").await);
        assert!(!fs.ensure("logs").await);
        assert_eq!(fs.write_file("logs/a.txt", "y".into()).await, None);

        // Existing directories still succeed
        assert!(fs.mkdir("dir").await);
        assert!(fs.mkdir("dir").await);
        assert!(fs.ensure("dir").await);
    }

    #[tokio::test]
    async fn test_access_sees_directories() {
        let (fs, _temp) = create_test_adapter(1024).await;
        fs.mkdir("d").await;
        assert!(fs.access("d").await);
    }

    #[tokio::test]
    async fn test_hash_reads_whole_file() {
        let (fs, _temp) = create_test_adapter(1 << 20).await;
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 253) as u8).collect();
        fs.write_file("big.bin", FileContent::Binary(data.clone())).await.unwrap();

        let digest = fs.read_file_to_hash(HashInput::Path("big.bin")).await.unwrap();
        assert_eq!(digest, digest_bytes(DigestAlgorithm::Md5, &data));
        assert_eq!(fs.read_file_to_hash(HashInput::Path("missing.bin")).await, None);
    }

    #[tokio::test]
    async fn test_file_info_kinds() {
        let (fs, _temp) = create_test_adapter(1 << 20).await;
        fs.write_file("v.mp4", FileContent::Binary(fixtures::mp4(600, 1200, 320, 240)))
            .await
            .unwrap();

        let file = fs.read_file_info("v.mp4", InfoKind::File).await.unwrap();
        assert!(file.size > 0);
        assert!(file.digest.is_none());

        let video = fs.read_file_info("v.mp4", InfoKind::Video).await.unwrap();
        assert_eq!((video.width, video.height), (Some(320), Some(240)));
        assert!((video.duration_secs.unwrap() - 2.0).abs() < 1e-9);

        assert_eq!(fs.read_file_info("v.mp4", InfoKind::Audio).await, None);
    }

    #[tokio::test]
    async fn test_readdir_missing_is_empty() {
        let (fs, _temp) = create_test_adapter(1024).await;
        assert!(fs.readdir("nowhere").await.is_empty());
    }
}
