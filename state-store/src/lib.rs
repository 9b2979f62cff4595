//! Versioned State Store
//!
//! A small latest-value store used by the relay to hold the current value of
//! every tracked key.
//!
//! # Features
//!
//! - **Versioned Records**: every write bumps the key's version by exactly one
//! - **Single Writer**: the writable [`StateStore`] is not `Clone`
//! - **Shared Readers**: [`StateReader`] handles observe writes immediately
//! - **Ordered Snapshots**: records come back in key order
//!
//! # Quick Start
//!
//! ```rust
//! use state_store::StateStore;
//!
//! let mut store = StateStore::with_initial([("power", false)]);
//! let reader = store.reader();
//!
//! let record = store.set("power", true);
//! assert_eq!(record.version, 1);
//! assert_eq!(reader.get(&"power").unwrap().value, true);
//! ```
//!
//! # Architecture
//!
//! ```text
//! StateStore<K, V>  (owned by the writer)
//!     │
//!     └── records: Arc<RwLock<BTreeMap<K, StateRecord<K, V>>>>
//!             │
//!             └── StateReader<K, V>  (cloned into readers)
//! ```

pub mod error;
pub mod record;
pub mod store;

pub use error::{Result, StoreError};
pub use record::StateRecord;
pub use store::{StateReader, StateStore};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::StoreError;
    pub use crate::record::StateRecord;
    pub use crate::store::{StateReader, StateStore};
}
