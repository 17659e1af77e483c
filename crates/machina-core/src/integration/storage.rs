//! The storage backend contract.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StorageResult;

/// A key-value store for raw bytes.
///
/// Backends govern their own concurrency. Keys are opaque to the backend;
/// namespacing is done by the caller.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Stores `value`, optionally expiring after `expires_in`.
    async fn set(&self, key: &str, value: Vec<u8>, expires_in: Option<Duration>)
    -> StorageResult<()>;

    async fn delete(&self, key: &str) -> StorageResult<()>;

    async fn has(&self, key: &str) -> StorageResult<bool>;

    /// Total size in bytes of the live values.
    async fn size(&self) -> StorageResult<usize>;
}
