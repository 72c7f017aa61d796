//! [`KvStore`] wrapper whose reads and writes can be switched to fail.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{KvStore, MemoryKvStore, StorageError, StorageResult};

/// In-memory store that returns [`StorageError::WriteFailed`] or
/// [`StorageError::TaskFailed`] while the matching switch is on.
///
/// Failures apply to every key unless scoped with [`FaultyKvStore::only_under`].
#[derive(Debug, Default)]
pub struct FaultyKvStore {
    inner: MemoryKvStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    scope: Option<String>,
}

impl FaultyKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that rejects every read and write from the start.
    pub fn broken() -> Self {
        let store = Self::new();
        store.fail_reads(true);
        store.fail_writes(true);
        store
    }

    /// Limits failures to keys starting with `prefix`.
    pub fn only_under(mut self, prefix: &str) -> Self {
        self.scope = Some(prefix.to_string());
        self
    }

    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    /// Covers `put` and `delete`.
    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    /// Keys currently held, expired ones included.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn in_scope(&self, key: &str) -> bool {
        self.scope.as_deref().is_none_or(|prefix| key.starts_with(prefix))
    }

    fn check_read(&self, key: &str) -> StorageResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) && self.in_scope(key) {
            return Err(StorageError::TaskFailed("read rejected".to_string()));
        }
        Ok(())
    }

    fn check_write(&self, key: &str) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) && self.in_scope(key) {
            return Err(StorageError::WriteFailed {
                key: key.to_string(),
                reason: "write rejected".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for FaultyKvStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.check_read(key)?;
        self.inner.get(key).await
    }

    async fn put(
        &self,
        key: &str,
        value: Vec<u8>,
        expires_at: Option<DateTime<Utc>>,
    ) -> StorageResult<()> {
        self.check_write(key)?;
        self.inner.put(key, value, expires_at).await
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        self.check_write(key)?;
        self.inner.delete(key).await
    }

    async fn list_expired(&self, prefix: &str, now: DateTime<Utc>) -> StorageResult<Vec<String>> {
        self.check_read(prefix)?;
        self.inner.list_expired(prefix, now).await
    }

    async fn scan(&self, prefix: &str) -> StorageResult<Vec<(String, Vec<u8>)>> {
        self.check_read(prefix)?;
        self.inner.scan(prefix).await
    }
}
