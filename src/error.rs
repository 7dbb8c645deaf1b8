//! Error taxonomy for the engine and its storage layer.

/// Storage-layer error type.
///
/// Every fallible [`crate::storage::Store`] method returns this. Conversions
/// from `rusqlite::Error` are automatic via `#[from]`, matching the taxonomy
/// in the external-interfaces section of the design: missing rows become
/// [`StorageError::NotFound`], everything else that bubbles up from SQLite
/// becomes [`StorageError::Database`] and is surfaced to callers as
/// [`EngineError::Unavailable`].
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Underlying database error (I/O, constraint violation, corruption).
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// Referenced id does not exist.
    #[error("memory not found: {0}")]
    NotFound(String),
    /// A referential constraint could not be satisfied (e.g. `contradicts`
    /// pointing at a nonexistent or already-deleted memory).
    #[error("conflict: {0}")]
    Conflict(String),
    /// Stored timestamp failed to parse as RFC3339.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
    /// Database could not be opened or migrated.
    #[error("initialization error: {0}")]
    Init(String),
}

/// Storage result type.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Engine-level error taxonomy, surfaced across the public API.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Unknown id on `get`, `delete`, or a targeted `reward`.
    #[error("not found: {0}")]
    NotFound(String),
    /// Rejected input: importance out of range, unknown type, negative limit,
    /// mismatched embedding dimensionality.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// `contradicts` references a nonexistent or already-deleted memory.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Underlying storage failed; callers may retry.
    #[error("storage unavailable: {0}")]
    Unavailable(#[from] StorageError),
}

/// Engine result type.
pub type Result<T> = std::result::Result<T, EngineError>;
