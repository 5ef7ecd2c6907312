//! Error types for storage operations.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in the storage adapter.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A keyspace or key was not found.
    #[error("not found: {what}")]
    NotFound {
        /// Name of the missing keyspace or key.
        what: String,
    },

    /// A keyspace already exists.
    #[error("already exists: {name}")]
    AlreadyExists {
        /// Name of the existing keyspace.
        name: String,
    },

    /// Stored data failed to decode or the substrate reported corruption.
    #[error("corruption: {message}")]
    Corruption {
        /// Description of the corruption.
        message: String,
    },

    /// The substrate reported an I/O or internal failure.
    #[error("I/O error: {message}")]
    Io {
        /// Description of the failure.
        message: String,
    },

    /// The store has been closed.
    #[error("store is closed")]
    Closed,
}

impl StorageError {
    /// Creates a not-found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Creates an already-exists error.
    pub fn already_exists(name: impl Into<String>) -> Self {
        Self::AlreadyExists { name: name.into() }
    }

    /// Creates a corruption error.
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::Corruption {
            message: message.into(),
        }
    }

    /// Creates an I/O error.
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }
}

impl From<rocksdb::Error> for StorageError {
    fn from(err: rocksdb::Error) -> Self {
        match err.kind() {
            rocksdb::ErrorKind::NotFound => StorageError::not_found(err.to_string()),
            rocksdb::ErrorKind::Corruption => StorageError::corruption(err.to_string()),
            _ => StorageError::io(err.to_string()),
        }
    }
}
