//! # Unified Facade
//!
//! The operation set every adapter implements. Consumers depend on
//! [`FileSystem`] only.
//!
//! Nothing here returns `Result`. Ordinary failures (missing file, permission
//! or quota denial, constraint violation) resolve to `None`, `false` or an
//! empty vector, and callers must check for that.

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::digest::Digest;
use crate::observability::{Event, Logger};

/// Raw file content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum FileContent {
    Text(String),
    Binary(Vec<u8>),
}

impl FileContent {
    /// Classify raw bytes: valid UTF-8 becomes text
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => FileContent::Text(text),
            Err(e) => FileContent::Binary(e.into_bytes()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FileContent::Text(text) => text.as_bytes(),
            FileContent::Binary(bytes) => bytes,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            FileContent::Text(text) => text.into_bytes(),
            FileContent::Binary(bytes) => bytes,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FileContent::Text(text) => Some(text),
            FileContent::Binary(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for FileContent {
    fn from(s: &str) -> Self {
        FileContent::Text(s.to_string())
    }
}

impl From<String> for FileContent {
    fn from(s: String) -> Self {
        FileContent::Text(s)
    }
}

impl From<Vec<u8>> for FileContent {
    fn from(bytes: Vec<u8>) -> Self {
        FileContent::Binary(bytes)
    }
}

impl From<&[u8]> for FileContent {
    fn from(bytes: &[u8]) -> Self {
        FileContent::Binary(bytes.to_vec())
    }
}

/// Which probe `read_file_info` runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InfoKind {
    File,
    Audio,
    Video,
    Image,
}

impl InfoKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InfoKind::File => "file",
            InfoKind::Audio => "audio",
            InfoKind::Video => "video",
            InfoKind::Image => "image",
        }
    }
}

impl fmt::Display for InfoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for InfoKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(InfoKind::File),
            "audio" => Ok(InfoKind::Audio),
            "video" => Ok(InfoKind::Video),
            "image" => Ok(InfoKind::Image),
            other => Err(format!("unknown info kind: {}", other)),
        }
    }
}

/// Read-only file descriptor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<Digest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    /// Playback length (audio/video)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// One `readdir` entry
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// What `read_file_to_hash` fingerprints
#[derive(Debug, Clone, Copy)]
pub enum HashInput<'a> {
    /// Stored file, hashed through the adapter's own digest route
    Path(&'a str),
    Bytes(&'a [u8]),
    Text(&'a str),
}

/// Text written by `write_json`: strings verbatim, everything else as JSON
pub fn json_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The backend-agnostic storage operation set
pub trait FileSystem: Send + Sync {
    /// Backend name used in log lines
    fn backend(&self) -> &'static str;

    fn read_file(&self, path: &str) -> impl Future<Output = Option<FileContent>> + Send;

    /// Read and parse JSON. Parsing is attempted only on text content.
    fn read_json(&self, path: &str) -> impl Future<Output = Option<Value>> + Send {
        async move {
            let content = self.read_file(path).await?;
            let text = content.as_text()?;
            match serde_json::from_str(text) {
                Ok(value) => Some(value),
                Err(e) => {
                    let message = e.to_string();
                    Logger::warn(
                        Event::OpFailed.as_str(),
                        &[
                            ("backend", self.backend()),
                            ("op", "read_json"),
                            ("path", path),
                            ("error", message.as_str()),
                        ],
                    );
                    None
                }
            }
        }
    }

    /// Write content, overwriting. Resolves the written location.
    fn write_file(
        &self,
        path: &str,
        data: FileContent,
    ) -> impl Future<Output = Option<String>> + Send;

    fn write_json(&self, path: &str, data: &Value) -> impl Future<Output = Option<String>> + Send {
        let text = json_text(data);
        async move { self.write_file(path, FileContent::Text(text)).await }
    }

    /// Copy content; does nothing when the source read comes back empty
    fn read_and_write(
        &self,
        source: &str,
        target: &str,
    ) -> impl Future<Output = Option<String>> + Send {
        async move {
            let content = self.read_file(source).await?;
            if content.is_empty() {
                return None;
            }
            self.write_file(target, content).await
        }
    }

    /// Idempotent directory creation
    fn mkdir(&self, path: &str) -> impl Future<Output = bool> + Send;

    /// `false` when the file is missing
    fn unlink(&self, path: &str) -> impl Future<Output = bool> + Send;

    /// Recursive removal
    fn rmdir(&self, path: &str) -> impl Future<Output = bool> + Send;

    /// Create if absent
    fn ensure(&self, path: &str) -> impl Future<Output = bool> + Send;

    fn readdir(&self, path: &str) -> impl Future<Output = Vec<DirEntry>> + Send;

    fn access(&self, path: &str) -> impl Future<Output = bool> + Send;

    fn read_file_info(
        &self,
        path: &str,
        kind: InfoKind,
    ) -> impl Future<Output = Option<FileInfo>> + Send;

    fn read_file_to_hash(&self, input: HashInput<'_>)
        -> impl Future<Output = Option<Digest>> + Send;
}
