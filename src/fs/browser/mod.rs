//! # Browser-Store Adapter
//!
//! Files live as records in the `files_store` table of a versioned record
//! database:
//!
//! | field       | index                |
//! |-------------|----------------------|
//! | `fileName`  | `fileName`           |
//! | `fileHash`  | `fileHash` (unique)  |
//! | `payload`   |                      |
//!
//! The unique content index means two different paths cannot hold identical
//! bytes. A write that would create such a duplicate fails and leaves the
//! table untouched. The index only guards against OTHER records: rewriting
//! a path with its own current content succeeds and still leaves one record
//! for that path. Copying a file within this backend therefore always fails.
//!
//! Every table access, lookups included, runs in its own short-lived
//! read-write transaction on `files_store`. Nothing is batched across facade
//! calls.
//!
//! JSON documents bypass the table and live in the flat string store under
//! `__files_store_<path>__`.
//!
//! There are no real directories. A directory is the set of names sharing a
//! `<dir>/` prefix, so `mkdir` and `ensure` succeed once the table exists and
//! `rmdir` deletes every record under the prefix.

mod database;
mod string_store;

pub use database::{
    Database, DatabaseError, DatabaseFactory, IndexedRecord, ObjectStore, RecordKey,
    StoreTransaction, TransactionMode, UpgradeTransaction,
};
pub use string_store::StringStore;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::digest::{digest_bytes, digest_text, Digest, DigestAlgorithm};
use super::errors::{FsError, FsResult, InitError};
use super::facade::{json_text, DirEntry, FileContent, FileInfo, FileSystem, HashInput, InfoKind};
use super::path::key_prefix;
use super::probe::probe_media;
use super::{absorb, absorb_flag, log_failure};
use crate::config::{DatabaseConfig, StorageConfig};
use crate::selector::{Backend, Environment};

const BACKEND: &str = "browser";

/// Table holding file records
pub const FILES_STORE: &str = "files_store";
/// Non-unique index over the path
pub const FILE_NAME_INDEX: &str = "fileName";
/// Unique index over the content digest
pub const FILE_HASH_INDEX: &str = "fileHash";

const JSON_KEY_PREFIX: &str = "__files_store_";
const JSON_KEY_SUFFIX: &str = "__";

/// One stored file
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub file_name: String,
    pub file_hash: Digest,
    pub payload: FileContent,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IndexedRecord for FileRecord {
    fn index_value(&self, key_path: &str) -> Option<String> {
        match key_path {
            FILE_NAME_INDEX => Some(self.file_name.clone()),
            FILE_HASH_INDEX => Some(self.file_hash.as_str().to_string()),
            _ => None,
        }
    }
}

/// Schema upgrade: create `files_store` and its indexes if missing
fn create_tables(tx: &mut UpgradeTransaction<'_, FileRecord>) -> Result<(), DatabaseError> {
    if tx.contains(FILES_STORE) {
        return Ok(());
    }
    let store = tx.create_object_store(FILES_STORE, true)?;
    store.create_index(FILE_NAME_INDEX, FILE_NAME_INDEX, false)?;
    store.create_index(FILE_HASH_INDEX, FILE_HASH_INDEX, true)?;
    Ok(())
}

fn record_name(path: &str) -> &str {
    path.trim_matches('/')
}

fn json_key(path: &str) -> String {
    format!("{}{}{}", JSON_KEY_PREFIX, record_name(path), JSON_KEY_SUFFIX)
}

fn json_path(key: &str) -> Option<&str> {
    key.strip_prefix(JSON_KEY_PREFIX)?.strip_suffix(JSON_KEY_SUFFIX)
}

/// Immediate children of `prefix` among `names`. A name with a further `/`
/// makes its first segment a directory.
fn children<'a>(prefix: &str, names: impl Iterator<Item = &'a str>) -> Vec<DirEntry> {
    let mut seen: BTreeMap<String, bool> = BTreeMap::new();

    for name in names {
        let Some(rest) = name.strip_prefix(prefix) else {
            continue;
        };
        match rest.split_once('/') {
            Some((dir, _)) if !dir.is_empty() => {
                seen.insert(dir.to_string(), true);
            }
            Some(_) => {}
            None if !rest.is_empty() => {
                seen.entry(rest.to_string()).or_insert(false);
            }
            None => {}
        }
    }

    seen.into_iter()
        .map(|(name, is_dir)| DirEntry { name, is_dir })
        .collect()
}

/// Record database adapter
pub struct BrowserStoreAdapter {
    database: Arc<Database<FileRecord>>,
    strings: Arc<StringStore>,
    algorithm: DigestAlgorithm,
}

impl BrowserStoreAdapter {
    /// Open the configured database through `factory`, running the schema
    /// upgrade if the stored version is older.
    pub fn open_with(
        factory: &DatabaseFactory<FileRecord>,
        strings: Arc<StringStore>,
        config: &DatabaseConfig,
        algorithm: DigestAlgorithm,
    ) -> Result<Self, InitError> {
        let unavailable = |reason: String| InitError::DatabaseUnavailable {
            name: config.name.clone(),
            version: config.version,
            reason,
        };

        let database = factory
            .open(&config.name, config.version, create_tables)
            .map_err(|e| unavailable(e.to_string()))?;

        if !database.object_store_names().iter().any(|s| s == FILES_STORE) {
            return Err(unavailable(format!("missing object store {}", FILES_STORE)));
        }

        Ok(Self {
            database,
            strings,
            algorithm,
        })
    }

    /// Fresh in-memory database and string store
    pub fn open_in_memory(config: &StorageConfig) -> Result<Self, InitError> {
        Self::open_with(
            &DatabaseFactory::new(),
            Arc::new(StringStore::new(config.database.string_store_quota_bytes)),
            &config.database,
            config.digest_algorithm,
        )
    }

    pub fn database(&self) -> &Database<FileRecord> {
        &self.database
    }

    pub fn strings(&self) -> &StringStore {
        &self.strings
    }

    /// Number of file records
    pub fn record_count(&self) -> usize {
        self.table(|tx| Ok(tx.store().len())).unwrap_or(0)
    }

    /// Paths of records whose content digest is `digest`
    pub fn records_with_hash(&self, digest: &Digest) -> Vec<String> {
        self.table(|tx| {
            Ok(tx
                .store()
                .index_get_all(FILE_HASH_INDEX, digest.as_str())?
                .into_iter()
                .map(|(_, r)| r.file_name.clone())
                .collect())
        })
        .unwrap_or_default()
    }

    /// Run `f` in a fresh read-write transaction on `files_store`
    fn table<T, F>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&mut StoreTransaction<'_, FileRecord>) -> Result<T, DatabaseError>,
    {
        self.database.transaction(FILES_STORE, TransactionMode::ReadWrite, f)
    }

    fn find(&self, path: &str) -> FsResult<FileRecord> {
        let name = record_name(path);
        let record = self.table(|tx| {
            Ok(tx.index_get(FILE_NAME_INDEX, name)?.map(|(_, r)| r.clone()))
        })?;
        record.ok_or_else(|| FsError::NotFound(path.to_string()))
    }

    fn json_blob(&self, path: &str) -> FsResult<String> {
        self.strings
            .get_item(&json_key(path))
            .ok_or_else(|| FsError::NotFound(path.to_string()))
    }

    fn try_write(&self, path: &str, data: FileContent) -> FsResult<String> {
        let name = record_name(path);
        if name.is_empty() {
            return Err(FsError::InvalidPath(path.to_string()));
        }

        let file_hash = digest_bytes(self.algorithm, data.as_bytes());
        let now = Utc::now();

        self.table(|tx| {
            let existing = tx
                .index_get(FILE_NAME_INDEX, name)?
                .map(|(key, r)| (key, r.created_at));

            let (key, created_at) = match existing {
                Some((key, created_at)) => (Some(key), created_at),
                None => (None, now),
            };

            let record = FileRecord {
                file_name: name.to_string(),
                file_hash,
                payload: data,
                created_at,
                updated_at: now,
            };

            match key {
                Some(key) => tx.put(record, Some(key)),
                None => tx.add(record, None),
            }
        })?;

        Ok(path.to_string())
    }

    fn try_unlink(&self, path: &str) -> FsResult<()> {
        let name = record_name(path);
        let removed = self.table(|tx| {
            match tx.index_get(FILE_NAME_INDEX, name)?.map(|(key, _)| key) {
                Some(key) => tx.delete(key),
                None => Ok(false),
            }
        })?;
        let removed_json = self.strings.remove_item(&json_key(path));

        if removed || removed_json {
            Ok(())
        } else {
            Err(FsError::NotFound(path.to_string()))
        }
    }

    fn try_rmdir(&self, path: &str) -> FsResult<()> {
        let prefix = key_prefix(path);
        if prefix.is_empty() {
            return Err(FsError::InvalidPath(path.to_string()));
        }

        let removed = self.table(|tx| {
            let keys: Vec<RecordKey> = tx
                .store()
                .iter()
                .filter(|(_, r)| r.file_name.starts_with(&prefix))
                .map(|(key, _)| key)
                .collect();
            for key in &keys {
                tx.delete(*key)?;
            }
            Ok(keys.len())
        })?;

        let mut removed_json = 0;
        for key in self.strings.keys() {
            if json_path(&key).is_some_and(|p| p.starts_with(&prefix)) && self.strings.remove_item(&key) {
                removed_json += 1;
            }
        }

        if removed + removed_json == 0 {
            return Err(FsError::NotFound(path.to_string()));
        }
        Ok(())
    }

    fn try_readdir(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        let prefix = key_prefix(path);
        let mut names = self.table(|tx| {
            Ok(tx
                .store()
                .iter()
                .map(|(_, r)| r.file_name.clone())
                .collect::<Vec<_>>())
        })?;
        names.extend(
            self.strings
                .keys()
                .iter()
                .filter_map(|k| json_path(k).map(str::to_string)),
        );

        Ok(children(&prefix, names.iter().map(String::as_str)))
    }

    fn has_table(&self) -> bool {
        self.database
            .object_store_names()
            .iter()
            .any(|s| s == FILES_STORE)
    }
}

impl FileSystem for BrowserStoreAdapter {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn read_file(&self, path: &str) -> Option<FileContent> {
        absorb(BACKEND, "read_file", path, self.find(path)).map(|r| r.payload)
    }

    /// JSON documents come from the string store; a plain file record with
    /// JSON text is the fallback.
    async fn read_json(&self, path: &str) -> Option<Value> {
        let text = match self.strings.get_item(&json_key(path)) {
            Some(text) => text,
            None => {
                let record = absorb(BACKEND, "read_json", path, self.find(path))?;
                record.payload.as_text()?.to_string()
            }
        };

        let parsed = serde_json::from_str(&text).map_err(FsError::from);
        absorb(BACKEND, "read_json", path, parsed)
    }

    async fn write_file(&self, path: &str, data: FileContent) -> Option<String> {
        absorb(BACKEND, "write_file", path, self.try_write(path, data))
    }

    async fn write_json(&self, path: &str, data: &Value) -> Option<String> {
        let result = self.strings.set_item(&json_key(path), &json_text(data));
        absorb(BACKEND, "write_json", path, result).map(|_| path.to_string())
    }

    async fn mkdir(&self, _path: &str) -> bool {
        self.has_table()
    }

    async fn unlink(&self, path: &str) -> bool {
        absorb_flag(BACKEND, "unlink", path, self.try_unlink(path))
    }

    async fn rmdir(&self, path: &str) -> bool {
        absorb_flag(BACKEND, "rmdir", path, self.try_rmdir(path))
    }

    async fn ensure(&self, _path: &str) -> bool {
        self.has_table()
    }

    async fn readdir(&self, path: &str) -> Vec<DirEntry> {
        absorb(BACKEND, "readdir", path, self.try_readdir(path)).unwrap_or_default()
    }

    async fn access(&self, path: &str) -> bool {
        match self.find(path) {
            Ok(_) => true,
            Err(FsError::NotFound(_)) => self.strings.get_item(&json_key(path)).is_some(),
            Err(e) => {
                log_failure(BACKEND, "access", path, &e);
                false
            }
        }
    }

    async fn read_file_info(&self, path: &str, kind: InfoKind) -> Option<FileInfo> {
        if kind == InfoKind::File {
            if let Ok(text) = self.json_blob(path) {
                return Some(FileInfo {
                    size: text.len() as u64,
                    digest: Some(digest_text(self.algorithm, &text)),
                    ..Default::default()
                });
            }
        }

        let record = absorb(BACKEND, "read_file_info", path, self.find(path))?;
        let mut info = FileInfo {
            size: record.payload.len() as u64,
            digest: Some(record.file_hash),
            modified: Some(record.updated_at),
            ..Default::default()
        };

        if kind != InfoKind::File {
            let media = probe_media(kind, record.payload.as_bytes())
                .ok_or_else(|| FsError::UnsupportedProbe(path.to_string()));
            let media = absorb(BACKEND, "read_file_info", path, media)?;
            info.duration_secs = media.duration_secs;
            info.width = media.width;
            info.height = media.height;
        }

        Some(info)
    }

    async fn read_file_to_hash(&self, input: HashInput<'_>) -> Option<Digest> {
        match input {
            HashInput::Path(path) => match self.find(path) {
                Ok(record) => Some(record.file_hash),
                Err(FsError::NotFound(_)) => {
                    let text = absorb(BACKEND, "read_file_to_hash", path, self.json_blob(path))?;
                    Some(digest_text(self.algorithm, &text))
                }
                Err(e) => {
                    log_failure(BACKEND, "read_file_to_hash", path, &e);
                    None
                }
            },
            HashInput::Bytes(bytes) => Some(digest_bytes(self.algorithm, bytes)),
            HashInput::Text(text) => Some(digest_text(self.algorithm, text)),
        }
    }
}

impl Backend for BrowserStoreAdapter {
    const ENVIRONMENT: Environment = Environment::Browser;

    async fn open(config: &StorageConfig) -> Result<Self, InitError> {
        Self::open_in_memory(config)
    }
}
