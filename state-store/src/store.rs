//! Versioned state storage with a single writer
//!
//! This module provides the storage primitives for the relay's shared state:
//! - `StateStore<K, V>`: the writable store, owned by exactly one writer
//! - `StateReader<K, V>`: a cloneable read-only view over the same records

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Result, StoreError};
use crate::record::StateRecord;

type Records<K, V> = Arc<RwLock<BTreeMap<K, StateRecord<K, V>>>>;

// ============================================================================
// StateStore<K, V> - the single writer
// ============================================================================

/// Latest-value store where every write bumps the key's version
///
/// The store is intentionally not `Clone`: whoever owns it is the only
/// writer. Readers obtain a [`StateReader`] via [`StateStore::reader`].
///
/// # Example
///
/// ```rust
/// use state_store::StateStore;
///
/// let mut store = StateStore::with_initial([("power", "off"), ("color", "#ffffff")]);
/// let reader = store.reader();
///
/// let record = store.set("power", "on");
/// assert_eq!(record.version, 1);
///
/// assert_eq!(reader.get(&"power").unwrap().value, "on");
/// assert_eq!(reader.get(&"color").unwrap().version, 0);
/// assert!(reader.get(&"missing").is_err());
/// ```
pub struct StateStore<K, V>
where
    K: Ord + Clone + fmt::Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    records: Records<K, V>,
}

impl<K, V> StateStore<K, V>
where
    K: Ord + Clone + fmt::Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Create a store seeded with one version-0 record per entry
    pub fn with_initial<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let records = entries
            .into_iter()
            .map(|(key, value)| (key.clone(), StateRecord::initial(key, value)))
            .collect();

        Self {
            records: Arc::new(RwLock::new(records)),
        }
    }

    /// Write a value, returning the new record
    ///
    /// The version is incremented under the write lock, so concurrent
    /// readers never observe a value without its matching version.
    pub fn set(&mut self, key: K, value: V) -> StateRecord<K, V> {
        let mut records = self.records.write();
        let record = match records.get(&key) {
            Some(current) => current.next(value),
            None => {
                let mut record = StateRecord::initial(key.clone(), value);
                record.version = 1;
                record
            }
        };
        records.insert(key, record.clone());
        record
    }

    /// Get the current record for a key
    pub fn get(&self, key: &K) -> Result<StateRecord<K, V>> {
        read_record(&self.records, key)
    }

    /// All records in key order
    pub fn snapshot(&self) -> Vec<StateRecord<K, V>> {
        self.records.read().values().cloned().collect()
    }

    /// Current version of a key, if tracked
    pub fn version(&self, key: &K) -> Option<u64> {
        self.records.read().get(key).map(|r| r.version)
    }

    /// Tracked keys in order
    pub fn keys(&self) -> Vec<K> {
        self.records.read().keys().cloned().collect()
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create a read-only view sharing this store's records
    pub fn reader(&self) -> StateReader<K, V> {
        StateReader {
            records: Arc::clone(&self.records),
        }
    }
}

impl<K, V> Default for StateStore<K, V>
where
    K: Ord + Clone + fmt::Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for StateStore<K, V>
where
    K: Ord + Clone + fmt::Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("key_count", &self.len())
            .finish()
    }
}

// ============================================================================
// StateReader<K, V> - shared read access
// ============================================================================

/// Read-only view of a [`StateStore`]
///
/// Cheap to clone; all clones observe the writer's updates immediately.
pub struct StateReader<K, V>
where
    K: Ord + Clone + fmt::Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    records: Records<K, V>,
}

impl<K, V> StateReader<K, V>
where
    K: Ord + Clone + fmt::Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Get the current record for a key
    pub fn get(&self, key: &K) -> Result<StateRecord<K, V>> {
        read_record(&self.records, key)
    }

    /// All records in key order
    pub fn snapshot(&self) -> Vec<StateRecord<K, V>> {
        self.records.read().values().cloned().collect()
    }

    /// Current version of a key, if tracked
    pub fn version(&self, key: &K) -> Option<u64> {
        self.records.read().get(key).map(|r| r.version)
    }

    /// Tracked keys in order
    pub fn keys(&self) -> Vec<K> {
        self.records.read().keys().cloned().collect()
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Clone for StateReader<K, V>
where
    K: Ord + Clone + fmt::Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
        }
    }
}

impl<K, V> fmt::Debug for StateReader<K, V>
where
    K: Ord + Clone + fmt::Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateReader")
            .field("key_count", &self.len())
            .finish()
    }
}

fn read_record<K, V>(records: &Records<K, V>, key: &K) -> Result<StateRecord<K, V>>
where
    K: Ord + Clone + fmt::Display,
    V: Clone,
{
    records
        .read()
        .get(key)
        .cloned()
        .ok_or_else(|| StoreError::NotFound(key.to_string()))
}
