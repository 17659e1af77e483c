//! Namespaced plugin storage and the built-in in-memory backend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;

use machina_core::{StorageBackend, StorageResult};

// =============================================================================
// PluginStorage
// =============================================================================

/// A view of a storage backend restricted to one namespace.
///
/// Every key is stored as `<namespace>:<key>`, so plugins cannot collide with
/// each other. Access is not serialised here; the backend governs concurrency.
#[derive(Clone)]
pub struct PluginStorage {
    namespace: String,
    backend: Arc<dyn StorageBackend>,
}

impl PluginStorage {
    pub fn new(namespace: impl Into<String>, backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            namespace: namespace.into(),
            backend,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    pub async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.backend.get(&self.namespaced(key)).await
    }

    pub async fn set(
        &self,
        key: &str,
        value: impl Into<Vec<u8>>,
        expires_in: Option<Duration>,
    ) -> StorageResult<()> {
        self.backend
            .set(&self.namespaced(key), value.into(), expires_in)
            .await
    }

    pub async fn delete(&self, key: &str) -> StorageResult<()> {
        self.backend.delete(&self.namespaced(key)).await
    }

    pub async fn has(&self, key: &str) -> StorageResult<bool> {
        self.backend.has(&self.namespaced(key)).await
    }

    /// Reads and deserializes a JSON value.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        match self.get(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Serializes and stores a JSON value.
    pub async fn set_json<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        expires_in: Option<Duration>,
    ) -> StorageResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.set(key, bytes, expires_in).await
    }

    /// Size in bytes of the whole backend, across all namespaces.
    pub async fn backend_size(&self) -> StorageResult<usize> {
        self.backend.size().await
    }
}

impl std::fmt::Debug for PluginStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginStorage")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// MemoryStorage
// =============================================================================

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|deadline| deadline > now)
    }
}

/// A process-local storage backend.
///
/// Expired entries are dropped lazily, when they are next looked at.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_live(Instant::now()) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        expires_in: Option<Duration>,
    ) -> StorageResult<()> {
        let expires_at = expires_in.and_then(|ttl| Instant::now().checked_add(ttl));
        self.entries
            .lock()
            .insert(key.to_owned(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn size(&self) -> StorageResult<usize> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| entry.is_live(now));
        Ok(entries.values().map(|entry| entry.value.len()).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_keys_are_namespaced() {
        let backend = Arc::new(MemoryStorage::new());
        let storage = PluginStorage::new("greeter", backend.clone());

        storage.set("count", b"1".to_vec(), None).await.unwrap();

        assert!(backend.has("greeter:count").await.unwrap());
        assert!(!backend.has("count").await.unwrap());
        assert_eq!(storage.get("count").await.unwrap(), Some(b"1".to_vec()));
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryStorage::new());
        let a = PluginStorage::new("a", backend.clone());
        let b = PluginStorage::new("b", backend);

        a.set("key", "from a", None).await.unwrap();
        assert!(b.get("key").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_json_helpers() {
        let storage = PluginStorage::new("ns", Arc::new(MemoryStorage::new()));
        storage
            .set_json("list", &vec!["a", "b"], None)
            .await
            .unwrap();
        let list: Option<Vec<String>> = storage.get_json("list").await.unwrap();
        assert_eq!(list, Some(vec!["a".to_owned(), "b".to_owned()]));
        let missing: Option<Vec<String>> = storage.get_json("nope").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_expired_entries_disappear() {
        let backend = MemoryStorage::new();
        backend
            .set("short", b"x".to_vec(), Some(Duration::from_millis(10)))
            .await
            .unwrap();
        backend.set("long", b"yy".to_vec(), None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(!backend.has("short").await.unwrap());
        assert_eq!(backend.size().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_delete() {
        let storage = PluginStorage::new("ns", Arc::new(MemoryStorage::new()));
        storage.set("k", "v", None).await.unwrap();
        storage.delete("k").await.unwrap();
        assert!(!storage.has("k").await.unwrap());
    }
}
