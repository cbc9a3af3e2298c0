//! Error types for the graph store.
//!
//! Every fallible store operation returns [`Result<T>`]. Constraint failures
//! raised by SQLite are classified on the way out so callers can match on
//! [`StoreError::UniquenessViolation`] and
//! [`StoreError::ReferentialIntegrityViolation`] instead of inspecting
//! driver error codes.
//!
//! Lookup misses are not errors: getters return `Option`, deletes return
//! `bool`.

use thiserror::Error;

/// Store error type.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A document with this id already exists and `force` was not set.
    ///
    /// `sha256_match` is `true` when the submitted bytes are identical to the
    /// stored ones, `false` when the content diverged.
    #[error("document '{document_id}' already exists (sha256 match: {sha256_match})")]
    DuplicateDocument {
        document_id: String,
        sha256_match: bool,
    },

    /// A UNIQUE or PRIMARY KEY constraint rejected a write.
    #[error("uniqueness violation: {0}")]
    UniquenessViolation(String),

    /// A FOREIGN KEY constraint rejected a write.
    #[error("referential integrity violation: {0}")]
    ReferentialIntegrityViolation(String),

    /// Caller supplied input the store cannot accept.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Persisted data failed validation on read.
    #[error("corrupt data: {0}")]
    Corrupt(String),

    /// The store handle has not been opened, or was closed.
    #[error("store is not open")]
    NotOpen,

    /// A schema migration step failed and was rolled back.
    #[error("migration to schema version {version} failed: {message}")]
    Migration { version: i64, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return StoreError::UniquenessViolation(db_err.message().to_string());
            }
            if db_err.is_foreign_key_violation() {
                return StoreError::ReferentialIntegrityViolation(db_err.message().to_string());
            }
        }
        StoreError::Database(err)
    }
}

impl StoreError {
    /// Returns `true` for [`StoreError::DuplicateDocument`].
    pub fn is_duplicate_document(&self) -> bool {
        matches!(self, StoreError::DuplicateDocument { .. })
    }
}
