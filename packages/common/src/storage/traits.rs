use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::StorageError;

/// Listing entry returned by [`ObjectStore::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub path: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Key-addressed binary storage for evidence documents.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store bytes under `key` and return the path to reference them by.
    async fn put(&self, key: &str, data: &[u8], content_type: &str)
    -> Result<String, StorageError>;

    /// Retrieve all bytes of an object.
    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Check whether an object exists.
    async fn exists(&self, path: &str) -> Result<bool, StorageError>;

    /// Delete an object.
    ///
    /// Returns `true` if the object was deleted, `false` if it did not exist.
    async fn delete(&self, path: &str) -> Result<bool, StorageError>;

    /// Time-limited download URL for an object.
    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<String, StorageError>;

    /// Every object whose path starts with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StorageError>;
}
