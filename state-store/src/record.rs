//! Versioned state records
//!
//! A `StateRecord` is the latest known value of one tracked key together
//! with its version. Versions start at 0 for seeded values and increase by
//! exactly one on every write, so consumers that see records out of order
//! can discard the stale ones.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// The latest value of a single key
///
/// # Example
///
/// ```rust
/// use state_store::StateRecord;
///
/// let older = StateRecord::initial("power", "off");
/// let newer = older.next("on");
///
/// assert_eq!(newer.version, 1);
/// assert!(newer.supersedes(&older));
/// assert!(!older.supersedes(&newer));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateRecord<K, V> {
    /// The key this record belongs to
    pub key: K,

    /// Current value
    pub value: V,

    /// Monotonic per-key version, bumped on every write
    pub version: u64,

    /// When the record was last written
    pub updated_at: DateTime<Utc>,
}

impl<K, V> StateRecord<K, V> {
    /// Create a seed record at version 0
    pub fn initial(key: K, value: V) -> Self {
        Self {
            key,
            value,
            version: 0,
            updated_at: Utc::now(),
        }
    }

    /// Whether this record is newer than `other` for the same key
    pub fn supersedes(&self, other: &Self) -> bool {
        self.version > other.version
    }
}

impl<K: Clone, V> StateRecord<K, V> {
    /// Produce the successor record carrying `value`
    pub fn next(&self, value: V) -> Self {
        Self {
            key: self.key.clone(),
            value,
            version: self.version + 1,
            updated_at: Utc::now(),
        }
    }
}
