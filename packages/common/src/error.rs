use thiserror::Error;

use crate::storage::StorageError;

/// Failure reported by a relational store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing service could not be reached or rejected the query.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A unique constraint rejected the write.
    #[error("duplicate key: {0}")]
    Duplicate(String),
    /// A persisted row could not be decoded into a domain value.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Error taxonomy shared by every core operation.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No session, or the session has expired.
    #[error("authentication required: {0}")]
    Auth(String),
    /// The actor is authenticated but may not perform this action.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Caller-fixable input problem. The message is shown verbatim.
    #[error("{0}")]
    Validation(String),
    /// An id or natural key does not resolve, or a transition precondition failed.
    #[error("{0}")]
    NotFound(String),
    /// A concurrent status change was detected.
    #[error("{0}")]
    Conflict(String),
    #[error("{context}: {source}")]
    Store {
        context: String,
        #[source]
        source: StoreError,
    },
    #[error("{context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: StorageError,
    },
}

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
}

/// Attaches a human-readable context string to store and storage failures.
pub trait ResultExt<T> {
    fn context(self, context: &str) -> Result<T, CoreError>;
}

impl<T> ResultExt<T> for Result<T, StoreError> {
    fn context(self, context: &str) -> Result<T, CoreError> {
        self.map_err(|source| CoreError::Store {
            context: context.to_string(),
            source,
        })
    }
}

impl<T> ResultExt<T> for Result<T, StorageError> {
    fn context(self, context: &str) -> Result<T, CoreError> {
        self.map_err(|source| CoreError::Storage {
            context: context.to_string(),
            source,
        })
    }
}
