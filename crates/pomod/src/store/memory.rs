//! In-memory store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::{KeyValueStore, StoreError, StoreValues};

/// A `KeyValueStore` held in process memory.
///
/// Clones share the same contents, so a test can keep one clone to inspect
/// or corrupt what the daemon persisted. Reads and writes can be made to
/// fail on demand to exercise the error paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<Map<String, Value>>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `entries`.
    pub fn with_entries(entries: Map<String, Value>) -> Self {
        Self {
            data: Arc::new(RwLock::new(entries)),
            ..Self::default()
        }
    }

    /// Makes every subsequent `get` fail (or succeed again).
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent `set_many` fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Copy of the current contents.
    pub async fn snapshot(&self) -> Map<String, Value> {
        self.data.read().await.clone()
    }

    /// Writes a raw value, bypassing failure injection.
    pub async fn insert_raw(&self, key: &str, value: Value) {
        self.data.write().await.insert(key.to_string(), value);
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<StoreValues, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("read failure injected".to_string()));
        }

        let data = self.data.read().await;
        Ok(keys
            .iter()
            .filter_map(|key| data.get(*key).map(|value| (key.to_string(), value.clone())))
            .collect())
    }

    async fn set_many(&self, entries: Map<String, Value>) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("write failure injected".to_string()));
        }

        let mut data = self.data.write().await;
        data.extend(entries);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entries(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_get_returns_only_present_keys() {
        let store = MemoryStore::with_entries(entries(&[("phase", json!("work"))]));

        let values = store.get(&["phase", "runState"]).await.unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values.get("phase"), Some(&json!("work")));
    }

    #[tokio::test]
    async fn test_set_many_overwrites_and_keeps_other_keys() {
        let store = MemoryStore::new();
        store
            .set_many(entries(&[("a", json!(1)), ("b", json!(2))]))
            .await
            .unwrap();
        store.set_many(entries(&[("a", json!(3))])).await.unwrap();

        let contents = store.snapshot().await;
        assert_eq!(contents.len(), 2);
        assert_eq!(contents.get("a"), Some(&json!(3)));
        assert_eq!(contents.get("b"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = MemoryStore::new();
        let shared = store.clone();

        shared.set_fail_writes(true);
        assert!(store.set_many(entries(&[("a", json!(1))])).await.is_err());
        assert!(store.snapshot().await.is_empty());

        shared.set_fail_writes(false);
        shared.set_fail_reads(true);
        assert!(store.get(&["a"]).await.is_err());
    }
}
