//! Error types for the document engine.

use docdb_codec::CodecError;
use docdb_storage::StorageError;
use std::io;
use thiserror::Error;

/// Result type for engine operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors surfaced by the public engine API.
///
/// Every operation returns a tagged error with a human-readable message;
/// nothing panics across the engine boundary.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A collection, document, or index was not found.
    #[error("not found: {what}")]
    NotFound {
        /// Name of the missing entity.
        what: String,
    },

    /// The entity already exists.
    #[error("already exists: {what}")]
    AlreadyExists {
        /// Name of the existing entity.
        what: String,
    },

    /// Stored data failed to deserialize, or the substrate reported
    /// corruption.
    #[error("corruption: {message}")]
    Corruption {
        /// Description of the corruption.
        message: String,
    },

    /// The operation or input shape is not supported.
    #[error("not supported: {message}")]
    NotSupported {
        /// Description of the unsupported input.
        message: String,
    },

    /// An argument was invalid: malformed filter or update trees,
    /// unindexed query fields, reserved collection names, NaN values.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the argument issue.
        message: String,
    },

    /// An I/O failure in the substrate or the filesystem.
    #[error("I/O error: {message}")]
    Io {
        /// Description of the failure.
        message: String,
    },

    /// An unexpected internal failure.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },

    /// The database has been closed.
    #[error("database is closed")]
    DatabaseClosed,
}

impl CoreError {
    /// Creates a not-found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Creates an already-exists error.
    pub fn already_exists(what: impl Into<String>) -> Self {
        Self::AlreadyExists { what: what.into() }
    }

    /// Creates a corruption error.
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::Corruption {
            message: message.into(),
        }
    }

    /// Creates a not-supported error.
    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::NotSupported {
            message: message.into(),
        }
    }

    /// Creates an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an I/O error.
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true for `NotFound`.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { what } => CoreError::NotFound { what },
            StorageError::AlreadyExists { name } => CoreError::AlreadyExists { what: name },
            StorageError::Corruption { message } => CoreError::Corruption { message },
            StorageError::Io { message } => CoreError::Io { message },
            StorageError::Closed => CoreError::DatabaseClosed,
        }
    }
}

impl From<CodecError> for CoreError {
    fn from(err: CodecError) -> Self {
        match err {
            // The only encode-side failure; everything else means stored
            // bytes failed to decode.
            CodecError::NanForbidden => CoreError::invalid_argument("NaN is not a valid value"),
            other => CoreError::corruption(other.to_string()),
        }
    }
}

impl From<io::Error> for CoreError {
    fn from(err: io::Error) -> Self {
        CoreError::io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_map_by_kind() {
        let err = CoreError::from(StorageError::not_found("keyspace x"));
        assert!(err.is_not_found());

        let err = CoreError::from(StorageError::Closed);
        assert!(matches!(err, CoreError::DatabaseClosed));
    }

    #[test]
    fn decode_failure_is_corruption_not_not_found() {
        let err = CoreError::from(CodecError::UnexpectedEof);
        assert!(matches!(err, CoreError::Corruption { .. }));
    }

    #[test]
    fn nan_is_invalid_argument() {
        let err = CoreError::from(CodecError::NanForbidden);
        assert!(matches!(err, CoreError::InvalidArgument { .. }));
    }
}
