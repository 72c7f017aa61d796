//! Exact-match tier.
//!
//! Keyed by the 32-byte BLAKE3 fingerprint from [`crate::hashing::fingerprint`]. The
//! in-memory map is a bounded moka cache; the shared [`KvStore`] backs it so entries
//! survive restarts and other processes sharing the same store can reuse them.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::types::{CacheEntry, expiry_after};
use crate::constants::keys::EXACT_PREFIX;
use crate::constants::{DEFAULT_CACHE_TTL_SECS, DEFAULT_EXACT_CAPACITY};
use crate::hashing::fingerprint_hex;
use crate::storage::{KvStore, StorageResult, get_json, put_json};

#[derive(Serialize, Deserialize)]
struct StoredExact<P> {
    payload: P,
    created_at: DateTime<Utc>,
}

/// Bounded, TTL-limited, first-writer-wins cache of question-set payloads.
pub struct ExactMatchCache<P> {
    entries: Cache<[u8; 32], Arc<CacheEntry<P>>>,
    store: Option<Arc<dyn KvStore>>,
    ttl: Duration,
}

impl<P> ExactMatchCache<P>
where
    P: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Memory-only cache with default capacity and TTL.
    pub fn new() -> Self {
        Self::with_config(
            DEFAULT_EXACT_CAPACITY,
            Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            None,
        )
    }

    pub fn with_config(capacity: u64, ttl: Duration, store: Option<Arc<dyn KvStore>>) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(capacity)
                .eviction_policy(EvictionPolicy::lru())
                .time_to_live(ttl)
                .build(),
            store,
            ttl,
        }
    }

    fn storage_key(fingerprint: &[u8; 32]) -> String {
        format!("{}{}", EXACT_PREFIX, fingerprint_hex(fingerprint))
    }

    /// Looks up `fingerprint`, falling back to the store on an in-memory miss.
    ///
    /// In-memory hits never touch the store; a failed read-through is returned to the
    /// caller.
    pub async fn get(&self, fingerprint: &[u8; 32]) -> StorageResult<Option<Arc<CacheEntry<P>>>> {
        if let Some(entry) = self.entries.get(fingerprint) {
            entry.record_hit();
            return Ok(Some(entry));
        }

        let Some(store) = self.store.as_ref() else {
            return Ok(None);
        };
        let key = Self::storage_key(fingerprint);

        let Some(stored) = get_json::<StoredExact<P>>(store.as_ref(), &key).await? else {
            return Ok(None);
        };

        if expiry_after(stored.created_at, self.ttl) <= Utc::now() {
            debug!(key = %key, "Persisted exact entry expired");
            return Ok(None);
        }

        let entry = self
            .entries
            .entry(*fingerprint)
            .or_insert_with(|| {
                Arc::new(CacheEntry::with_created_at(
                    fingerprint_hex(fingerprint),
                    stored.payload,
                    stored.created_at,
                ))
            })
            .into_value();
        entry.record_hit();
        debug!(key = %key, "Exact entry restored from store");
        Ok(Some(entry))
    }

    /// Inserts `payload` unless the key is already present.
    ///
    /// Returns `Ok(true)` if this call inserted. The write-through to the store happens
    /// only for the inserting call; if it fails the in-memory entry stays and the error
    /// is returned.
    pub async fn put(&self, fingerprint: [u8; 32], payload: P) -> StorageResult<bool> {
        let inserted = self
            .entries
            .entry(fingerprint)
            .or_insert_with(|| Arc::new(CacheEntry::new(fingerprint_hex(&fingerprint), payload)));

        if !inserted.is_fresh() {
            return Ok(false);
        }

        if let Some(store) = &self.store {
            let entry = inserted.into_value();
            let key = Self::storage_key(&fingerprint);
            let record = StoredExact {
                payload: entry.payload(),
                created_at: entry.created_at(),
            };
            put_json(store.as_ref(), &key, &record, Some(entry.expires_at(self.ttl))).await?;
        }
        Ok(true)
    }

    /// Deletes persisted entries whose TTL has elapsed.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> StorageResult<usize> {
        self.entries.run_pending_tasks();

        let Some(store) = &self.store else {
            return Ok(0);
        };

        let mut removed = 0;
        for key in store.list_expired(EXACT_PREFIX, now).await? {
            match store.delete(&key).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!(key = %key, error = %e, "Failed to purge exact entry"),
            }
        }
        Ok(removed)
    }

    #[inline]
    pub fn contains(&self, fingerprint: &[u8; 32]) -> bool {
        self.entries.contains_key(fingerprint)
    }

    /// Entry count; approximate until [`Self::run_pending_tasks`] runs.
    #[inline]
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.entry_count() == 0
    }

    #[inline]
    pub fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks();
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl<P> Default for ExactMatchCache<P>
where
    P: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P> std::fmt::Debug for ExactMatchCache<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExactMatchCache")
            .field("entries", &self.entries.entry_count())
            .field("ttl", &self.ttl)
            .field("persistent", &self.store.is_some())
            .finish()
    }
}
