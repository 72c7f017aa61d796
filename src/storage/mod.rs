//! Key-value storage shared by both cache tiers and the session store.
//!
//! Every consumer owns a key prefix (`exact:`, `semantic:`, `session:`) and stores
//! JSON-encoded records. Entries may carry an expiry; expired entries read as absent
//! and are reported by [`KvStore::list_expired`] until someone deletes them.

pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod faulty;
pub mod fs;
pub mod memory;


pub use error::{StorageError, StorageResult};
#[cfg(any(test, feature = "mock"))]
pub use faulty::FaultyKvStore;
pub use fs::FsKvStore;
pub use memory::MemoryKvStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Minimal key-value contract used by the engine.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Returns the value under `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Writes `value` under `key`, replacing any previous value.
    async fn put(
        &self,
        key: &str,
        value: Vec<u8>,
        expires_at: Option<DateTime<Utc>>,
    ) -> StorageResult<()>;

    /// Deletes `key`. Returns `true` if something was removed.
    async fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Keys under `prefix` whose expiry is at or before `now`.
    async fn list_expired(&self, prefix: &str, now: DateTime<Utc>) -> StorageResult<Vec<String>>;

    /// Live (unexpired) entries under `prefix`.
    async fn scan(&self, prefix: &str) -> StorageResult<Vec<(String, Vec<u8>)>>;
}

/// Reads and decodes a JSON record.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn KvStore,
    key: &str,
) -> StorageResult<Option<T>> {
    match store.get(key).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Encodes and writes a JSON record.
pub async fn put_json<T: Serialize + ?Sized>(
    store: &dyn KvStore,
    key: &str,
    value: &T,
    expires_at: Option<DateTime<Utc>>,
) -> StorageResult<()> {
    let bytes = serde_json::to_vec(value)?;
    store.put(key, bytes, expires_at).await
}

#[inline]
pub(crate) fn is_expired(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expires_at.is_some_and(|at| at <= now)
}
