//! # Versioned Record Database
//!
//! In-process rendition of the browser's transactional key-value database:
//!
//! - named databases with an integer schema version
//! - an upgrade callback that runs only when the requested version is higher
//!   than the stored one, and is the only place object stores can be created
//! - object stores with auto-increment keys and named indexes
//! - unique indexes: an add or put that would duplicate an indexed value fails
//!   and leaves the store unchanged
//! - transactions scoped to a single store; an error inside the transaction
//!   rolls back everything it did

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use thiserror::Error;

use crate::fs::errors::FsError;
use crate::observability::{log_event_with_fields, Event};

/// Primary key of a record
pub type RecordKey = u64;

/// Record database errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatabaseError {
    #[error("Requested version {requested} is lower than existing version {current}")]
    VersionError { requested: u32, current: u32 },

    #[error("Object store already exists: {0}")]
    StoreExists(String),

    #[error("Object store not found: {0}")]
    StoreNotFound(String),

    #[error("Index already exists: {0}")]
    IndexExists(String),

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Unique index {index} already contains {value}")]
    Constraint { index: String, value: String },

    #[error("Key already exists: {0}")]
    KeyExists(RecordKey),

    #[error("Object store {0} needs an explicit key")]
    MissingKey(String),

    #[error("Transaction is read-only")]
    ReadOnly,

    #[error("Lock poisoned")]
    LockPoisoned,
}

impl From<DatabaseError> for FsError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::Constraint { index, value } => {
                FsError::ConstraintViolation { index, key: value }
            }
            other => FsError::Database(other.to_string()),
        }
    }
}

/// A value that can be stored and indexed
pub trait IndexedRecord: Clone + Send + Sync + 'static {
    /// Value of the field at `key_path`, if the record has one
    fn index_value(&self, key_path: &str) -> Option<String>;
}

#[derive(Debug, Clone)]
struct Index {
    key_path: String,
    unique: bool,
    entries: BTreeMap<String, BTreeSet<RecordKey>>,
}

/// A table of records
#[derive(Debug, Clone)]
pub struct ObjectStore<R> {
    name: String,
    auto_increment: bool,
    next_key: RecordKey,
    records: BTreeMap<RecordKey, R>,
    indexes: BTreeMap<String, Index>,
}

impl<R: IndexedRecord> ObjectStore<R> {
    fn new(name: &str, auto_increment: bool) -> Self {
        Self {
            name: name.to_string(),
            auto_increment,
            next_key: 1,
            records: BTreeMap::new(),
            indexes: BTreeMap::new(),
        }
    }

    /// Create an index over `key_path`, populated from existing records
    pub fn create_index(
        &mut self,
        name: &str,
        key_path: &str,
        unique: bool,
    ) -> Result<(), DatabaseError> {
        if self.indexes.contains_key(name) {
            return Err(DatabaseError::IndexExists(name.to_string()));
        }

        let mut entries: BTreeMap<String, BTreeSet<RecordKey>> = BTreeMap::new();
        for (key, record) in &self.records {
            if let Some(value) = record.index_value(key_path) {
                let keys = entries.entry(value.clone()).or_default();
                if unique && !keys.is_empty() {
                    return Err(DatabaseError::Constraint {
                        index: name.to_string(),
                        value,
                    });
                }
                keys.insert(*key);
            }
        }

        self.indexes.insert(
            name.to_string(),
            Index {
                key_path: key_path.to_string(),
                unique,
                entries,
            },
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecordKey, &R)> {
        self.records.iter().map(|(k, r)| (*k, r))
    }

    /// All records whose indexed value equals `value`, in key order
    pub fn index_get_all(&self, index: &str, value: &str) -> Result<Vec<(RecordKey, &R)>, DatabaseError> {
        let index = self
            .indexes
            .get(index)
            .ok_or_else(|| DatabaseError::IndexNotFound(index.to_string()))?;

        Ok(index
            .entries
            .get(value)
            .map(|keys| {
                keys.iter()
                    .filter_map(|k| self.records.get(k).map(|r| (*k, r)))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// First record whose indexed value equals `value`
    pub fn index_get(&self, index: &str, value: &str) -> Result<Option<(RecordKey, &R)>, DatabaseError> {
        Ok(self.index_get_all(index, value)?.into_iter().next())
    }

    fn check_unique(&self, record: &R, own_key: Option<RecordKey>) -> Result<(), DatabaseError> {
        for (name, index) in &self.indexes {
            if !index.unique {
                continue;
            }
            let Some(value) = record.index_value(&index.key_path) else {
                continue;
            };
            if let Some(keys) = index.entries.get(&value) {
                if keys.iter().any(|k| Some(*k) != own_key) {
                    return Err(DatabaseError::Constraint {
                        index: name.clone(),
                        value,
                    });
                }
            }
        }
        Ok(())
    }

    fn assign_key(&mut self, key: Option<RecordKey>) -> Result<RecordKey, DatabaseError> {
        match key {
            Some(k) => {
                if self.auto_increment && k >= self.next_key {
                    self.next_key = k + 1;
                }
                Ok(k)
            }
            None if self.auto_increment => {
                let k = self.next_key;
                self.next_key += 1;
                Ok(k)
            }
            None => Err(DatabaseError::MissingKey(self.name.clone())),
        }
    }

    fn insert_unchecked(&mut self, key: RecordKey, record: R) {
        for index in self.indexes.values_mut() {
            if let Some(value) = record.index_value(&index.key_path) {
                index.entries.entry(value).or_default().insert(key);
            }
        }
        self.records.insert(key, record);
    }

    fn remove(&mut self, key: RecordKey) -> Option<R> {
        let record = self.records.remove(&key)?;
        for index in self.indexes.values_mut() {
            if let Some(value) = record.index_value(&index.key_path) {
                if let Some(keys) = index.entries.get_mut(&value) {
                    keys.remove(&key);
                    if keys.is_empty() {
                        index.entries.remove(&value);
                    }
                }
            }
        }
        Some(record)
    }

    fn add(&mut self, record: R, key: Option<RecordKey>) -> Result<RecordKey, DatabaseError> {
        if let Some(k) = key {
            if self.records.contains_key(&k) {
                return Err(DatabaseError::KeyExists(k));
            }
        }
        self.check_unique(&record, None)?;

        let key = self.assign_key(key)?;
        self.insert_unchecked(key, record);
        Ok(key)
    }

    fn put(&mut self, record: R, key: Option<RecordKey>) -> Result<(RecordKey, Option<R>), DatabaseError> {
        self.check_unique(&record, key)?;

        let key = self.assign_key(key)?;
        let previous = self.remove(key);
        self.insert_unchecked(key, record);
        Ok((key, previous))
    }
}

/// Transaction access mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    ReadOnly,
    ReadWrite,
}

/// A transaction over one object store
pub struct StoreTransaction<'a, R: IndexedRecord> {
    store: &'a mut ObjectStore<R>,
    mode: TransactionMode,
    /// (key, record before the change) in application order
    undo: Vec<(RecordKey, Option<R>)>,
    saved_next_key: RecordKey,
}

impl<'a, R: IndexedRecord> StoreTransaction<'a, R> {
    pub fn store(&self) -> &ObjectStore<R> {
        &*self.store
    }

    pub fn index_get(&self, index: &str, value: &str) -> Result<Option<(RecordKey, &R)>, DatabaseError> {
        self.store.index_get(index, value)
    }

    fn writable(&self) -> Result<(), DatabaseError> {
        match self.mode {
            TransactionMode::ReadOnly => Err(DatabaseError::ReadOnly),
            TransactionMode::ReadWrite => Ok(()),
        }
    }

    /// Insert a new record; fails if the key or a unique value is taken
    pub fn add(&mut self, record: R, key: Option<RecordKey>) -> Result<RecordKey, DatabaseError> {
        self.writable()?;
        let key = self.store.add(record, key)?;
        self.undo.push((key, None));
        Ok(key)
    }

    /// Insert or replace; unique values may only collide with the record being replaced
    pub fn put(&mut self, record: R, key: Option<RecordKey>) -> Result<RecordKey, DatabaseError> {
        self.writable()?;
        let (key, previous) = self.store.put(record, key)?;
        self.undo.push((key, previous));
        Ok(key)
    }

    /// Remove a record. Returns whether it existed.
    pub fn delete(&mut self, key: RecordKey) -> Result<bool, DatabaseError> {
        self.writable()?;
        match self.store.remove(key) {
            Some(previous) => {
                self.undo.push((key, Some(previous)));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn rollback(self) {
        for (key, previous) in self.undo.into_iter().rev() {
            self.store.remove(key);
            if let Some(record) = previous {
                self.store.insert_unchecked(key, record);
            }
        }
        self.store.next_key = self.saved_next_key;
    }
}

/// Schema changes allowed during a version upgrade
pub struct UpgradeTransaction<'a, R> {
    old_version: u32,
    new_version: u32,
    stores: &'a mut BTreeMap<String, ObjectStore<R>>,
}

impl<'a, R: IndexedRecord> UpgradeTransaction<'a, R> {
    pub fn old_version(&self) -> u32 {
        self.old_version
    }

    pub fn new_version(&self) -> u32 {
        self.new_version
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }

    pub fn object_store_names(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }

    pub fn create_object_store(
        &mut self,
        name: &str,
        auto_increment: bool,
    ) -> Result<&mut ObjectStore<R>, DatabaseError> {
        if self.stores.contains_key(name) {
            return Err(DatabaseError::StoreExists(name.to_string()));
        }
        Ok(self
            .stores
            .entry(name.to_string())
            .or_insert_with(|| ObjectStore::new(name, auto_increment)))
    }
}

struct DatabaseState<R> {
    version: u32,
    stores: BTreeMap<String, ObjectStore<R>>,
}

/// An open database
pub struct Database<R> {
    name: String,
    state: RwLock<DatabaseState<R>>,
}

impl<R: IndexedRecord> Database<R> {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: RwLock::new(DatabaseState {
                version: 0,
                stores: BTreeMap::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u32 {
        self.state.read().map(|s| s.version).unwrap_or_default()
    }

    pub fn object_store_names(&self) -> Vec<String> {
        self.state
            .read()
            .map(|s| s.stores.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Run `f` inside a transaction on `store`. An `Err` rolls back.
    pub fn transaction<T, F>(&self, store: &str, mode: TransactionMode, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&mut StoreTransaction<'_, R>) -> Result<T, DatabaseError>,
    {
        let mut state = self.state.write().map_err(|_| DatabaseError::LockPoisoned)?;
        let store = state
            .stores
            .get_mut(store)
            .ok_or_else(|| DatabaseError::StoreNotFound(store.to_string()))?;

        let saved_next_key = store.next_key;
        let mut tx = StoreTransaction {
            store,
            mode,
            undo: Vec::new(),
            saved_next_key,
        };

        match f(&mut tx) {
            Ok(value) => Ok(value),
            Err(e) => {
                tx.rollback();
                Err(e)
            }
        }
    }
}

/// Entry point for opening databases by name
pub struct DatabaseFactory<R> {
    databases: Mutex<HashMap<String, Arc<Database<R>>>>,
}

impl<R: IndexedRecord> Default for DatabaseFactory<R> {
    fn default() -> Self {
        Self {
            databases: Mutex::new(HashMap::new()),
        }
    }
}

impl<R: IndexedRecord> DatabaseFactory<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `name` at `version`.
    ///
    /// `upgrade` runs when `version` is above the stored version (a fresh
    /// database is at version 0). It works on a copy of the schema that is
    /// committed only if it returns `Ok`.
    pub fn open<F>(&self, name: &str, version: u32, upgrade: F) -> Result<Arc<Database<R>>, DatabaseError>
    where
        F: FnOnce(&mut UpgradeTransaction<'_, R>) -> Result<(), DatabaseError>,
    {
        let database = {
            let mut databases = self.databases.lock().map_err(|_| DatabaseError::LockPoisoned)?;
            databases
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Database::new(name)))
                .clone()
        };

        {
            let mut state = database.state.write().map_err(|_| DatabaseError::LockPoisoned)?;

            if version < state.version {
                return Err(DatabaseError::VersionError {
                    requested: version,
                    current: state.version,
                });
            }

            if version > state.version {
                let old_version = state.version;
                let mut stores = state.stores.clone();
                let mut tx = UpgradeTransaction {
                    old_version,
                    new_version: version,
                    stores: &mut stores,
                };
                upgrade(&mut tx)?;

                state.stores = stores;
                state.version = version;

                let from = old_version.to_string();
                let to = version.to_string();
                log_event_with_fields(
                    Event::StoreUpgrade,
                    &[("database", database.name()), ("from", from.as_str()), ("to", to.as_str())],
                );
            }
        }

        Ok(database)
    }
}
