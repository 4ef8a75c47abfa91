//! Flat string key-value store with a byte quota

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::fs::errors::{FsError, FsResult};

/// Synchronous string store. Usage counts key and value bytes.
#[derive(Debug)]
pub struct StringStore {
    items: RwLock<BTreeMap<String, String>>,
    quota_bytes: u64,
}

fn entry_size(key: &str, value: &str) -> u64 {
    (key.len() + value.len()) as u64
}

impl StringStore {
    pub fn new(quota_bytes: u64) -> Self {
        Self {
            items: RwLock::new(BTreeMap::new()),
            quota_bytes,
        }
    }

    pub fn get_item(&self, key: &str) -> Option<String> {
        self.items.read().ok()?.get(key).cloned()
    }

    /// Set `key`, replacing any previous value. Fails without change when
    /// the new total would exceed the quota.
    pub fn set_item(&self, key: &str, value: &str) -> FsResult<()> {
        let mut items = self
            .items
            .write()
            .map_err(|_| FsError::Database("string store lock poisoned".into()))?;

        let current: u64 = items.iter().map(|(k, v)| entry_size(k, v)).sum();
        let previous = items.get(key).map(|v| entry_size(key, v)).unwrap_or(0);
        let requested = entry_size(key, value);
        let available = self.quota_bytes.saturating_sub(current - previous);

        if requested > available {
            return Err(FsError::QuotaExceeded {
                requested,
                available,
            });
        }

        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Returns whether the key existed
    pub fn remove_item(&self, key: &str) -> bool {
        self.items
            .write()
            .map(|mut items| items.remove(key).is_some())
            .unwrap_or(false)
    }

    /// Keys in sorted order
    pub fn keys(&self) -> Vec<String> {
        self.items
            .read()
            .map(|items| items.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn usage_bytes(&self) -> u64 {
        self.items
            .read()
            .map(|items| items.iter().map(|(k, v)| entry_size(k, v)).sum())
            .unwrap_or(0)
    }
}
