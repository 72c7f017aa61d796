use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::{KvStore, StorageResult, is_expired};

#[derive(Debug, Clone)]
struct StoredValue {
    value: Vec<u8>,
    expires_at: Option<DateTime<Utc>>,
}

/// In-process [`KvStore`]. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, StoredValue>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let now = Utc::now();
        let entries = self.entries.read();
        Ok(entries
            .get(key)
            .filter(|stored| !is_expired(stored.expires_at, now))
            .map(|stored| stored.value.clone()))
    }

    async fn put(
        &self,
        key: &str,
        value: Vec<u8>,
        expires_at: Option<DateTime<Utc>>,
    ) -> StorageResult<()> {
        self.entries
            .write()
            .insert(key.to_string(), StoredValue { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        Ok(self.entries.write().remove(key).is_some())
    }

    async fn list_expired(&self, prefix: &str, now: DateTime<Utc>) -> StorageResult<Vec<String>> {
        let entries = self.entries.read();
        Ok(entries
            .iter()
            .filter(|(key, stored)| key.starts_with(prefix) && is_expired(stored.expires_at, now))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn scan(&self, prefix: &str) -> StorageResult<Vec<(String, Vec<u8>)>> {
        let now = Utc::now();
        let entries = self.entries.read();
        let mut out: Vec<_> = entries
            .iter()
            .filter(|(key, stored)| key.starts_with(prefix) && !is_expired(stored.expires_at, now))
            .map(|(key, stored)| (key.clone(), stored.value.clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }
}
