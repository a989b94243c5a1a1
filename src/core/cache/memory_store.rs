// src/core/cache/memory_store.rs

use super::CacheStore;
use crate::core::errors::ProxyError;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

/// A process-local, in-memory cache store. `DashMap::insert` replaces the
/// mapping atomically, so concurrent readers never observe a partially
/// written value.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Bytes>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, ProxyError> {
        Ok(self.entries.get(key).map(|e| e.value().clone()))
    }

    async fn put(&self, key: &str, bytes: Bytes) -> Result<(), ProxyError> {
        self.entries.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn purge(&self) -> Result<(), ProxyError> {
        self.entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn miss_then_hit_then_purge() {
        let store = MemoryStore::new();
        assert!(store.get("k").await.unwrap().is_none());

        store.put("k", Bytes::from_static(b"payload")).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().unwrap(), Bytes::from_static(b"payload"));

        store.purge().await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_put_last_writer_wins_without_panicking() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let mut handles = Vec::new();
        for i in 0..16u8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.put("k", Bytes::from(vec![i; 4])).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(store.get("k").await.unwrap().is_some());
    }
}
