//! Error types for the state store.

/// Errors returned by [`StateStore`](crate::StateStore) and
/// [`StateReader`](crate::StateReader) lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No record exists for the requested key
    #[error("State key not found: {0}")]
    NotFound(String),
}

/// Convenience type alias for Results using StoreError.
pub type Result<T> = std::result::Result<T, StoreError>;
