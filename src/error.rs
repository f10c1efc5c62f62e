//! Error types for the cache pool
//!
//! Provides unified error handling using thiserror. Storage backends speak
//! [`StorageError`]; callers of the pool only ever see [`PoolError`].

use std::error::Error as StdError;

use thiserror::Error;

// == Storage Error Enum ==
/// Errors raised by a storage backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The backend rejected an argument (key, value or option)
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String, code: i64 },

    /// Any other backend failure
    #[error("Storage failure: {message}")]
    Runtime {
        message: String,
        code: i64,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    /// The backend was asked for a capability it does not have
    #[error("Storage {storage} does not support {operation}")]
    Unsupported {
        storage: String,
        operation: &'static str,
    },
}

impl StorageError {
    /// Shorthand for an invalid argument with code 0.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        StorageError::InvalidArgument {
            message: message.into(),
            code: 0,
        }
    }

    /// Shorthand for a runtime failure without an underlying cause.
    pub fn runtime(message: impl Into<String>) -> Self {
        StorageError::Runtime {
            message: message.into(),
            code: 0,
            source: None,
        }
    }

    /// The message as reported by the backend, without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            StorageError::InvalidArgument { message, .. } => message.clone(),
            StorageError::Runtime { message, .. } => message.clone(),
            StorageError::Unsupported { .. } => self.to_string(),
        }
    }

    /// The numeric code reported by the backend.
    pub fn code(&self) -> i64 {
        match self {
            StorageError::InvalidArgument { code, .. } => *code,
            StorageError::Runtime { code, .. } => *code,
            StorageError::Unsupported { .. } => 0,
        }
    }
}

// == Pool Error Enum ==
/// Unified error type for pool operations.
#[derive(Error, Debug)]
pub enum PoolError {
    /// Illegal key, foreign item kind or malformed expiration
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        message: String,
        code: i64,
        #[source]
        source: Option<StorageError>,
    },

    /// The storage backend failed
    #[error("Cache failure: {message}")]
    CacheFailure {
        message: String,
        code: i64,
        #[source]
        source: Option<StorageError>,
    },

    /// The storage backend can neither clear a namespace nor flush
    #[error("Storage {storage} does not support clear()")]
    Unsupported { storage: String },
}

impl PoolError {
    /// A local precondition failure with no storage cause.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        PoolError::InvalidArgument {
            message: message.into(),
            code: 0,
            source: None,
        }
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, PoolError::InvalidArgument { .. })
    }

    pub fn is_cache_failure(&self) -> bool {
        matches!(self, PoolError::CacheFailure { .. })
    }

    /// Numeric code carried over from the storage error, 0 when local.
    pub fn code(&self) -> i64 {
        match self {
            PoolError::InvalidArgument { code, .. } => *code,
            PoolError::CacheFailure { code, .. } => *code,
            PoolError::Unsupported { .. } => 0,
        }
    }
}

// == Storage Error Translation ==
impl From<StorageError> for PoolError {
    fn from(err: StorageError) -> Self {
        let message = err.message();
        let code = err.code();
        match err {
            StorageError::InvalidArgument { .. } => PoolError::InvalidArgument {
                message,
                code,
                source: Some(err),
            },
            _ => PoolError::CacheFailure {
                message,
                code,
                source: Some(err),
            },
        }
    }
}

// == Result Type Aliases ==
/// Convenience Result type for pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;

/// Convenience Result type for storage backends.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_invalid_argument_translates_to_invalid_argument() {
        let err: PoolError = StorageError::InvalidArgument {
            message: "bad key".to_string(),
            code: 7,
        }
        .into();

        assert!(err.is_invalid_argument());
        assert_eq!(err.code(), 7);
        assert_eq!(err.to_string(), "Invalid argument: bad key");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_runtime_translates_to_cache_failure_with_cause_chain() {
        let cause = io::Error::new(io::ErrorKind::Other, "disk gone");
        let err: PoolError = StorageError::Runtime {
            message: "write failed".to_string(),
            code: 42,
            source: Some(Box::new(cause)),
        }
        .into();

        assert!(err.is_cache_failure());
        assert_eq!(err.code(), 42);
        assert_eq!(err.to_string(), "Cache failure: write failed");

        let storage = err.source().unwrap();
        assert_eq!(storage.to_string(), "Storage failure: write failed");
        assert_eq!(storage.source().unwrap().to_string(), "disk gone");
    }

    #[test]
    fn test_unsupported_storage_translates_to_cache_failure() {
        let err: PoolError = StorageError::Unsupported {
            storage: "memory".to_string(),
            operation: "flush",
        }
        .into();

        assert!(err.is_cache_failure());
        assert_eq!(
            err.to_string(),
            "Cache failure: Storage memory does not support flush"
        );
    }

    #[test]
    fn test_pool_unsupported_display() {
        let err = PoolError::Unsupported {
            storage: "memory".to_string(),
        };
        assert_eq!(err.to_string(), "Storage memory does not support clear()");
        assert_eq!(err.code(), 0);
    }
}
