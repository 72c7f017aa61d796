use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::signature::RoleSignature;
use super::similarity::{SimilarityMetric, WeightedFeatureSimilarity};
use crate::cache::types::{CacheEntry, expiry_after};
use crate::constants::keys::SEMANTIC_PREFIX;
use crate::constants::{DEFAULT_CACHE_TTL_SECS, DEFAULT_SEMANTIC_CAPACITY, DEFAULT_SEMANTIC_THRESHOLD};
use crate::session::Difficulty;
use crate::storage::{KvStore, StorageResult, put_json};

/// A semantic match that cleared the threshold.
#[derive(Debug, Clone)]
pub struct SemanticHit<P> {
    pub entry: Arc<CacheEntry<P>>,
    pub similarity: f32,
}

impl<P> SemanticHit<P> {
    #[inline]
    pub fn payload(&self) -> &P {
        self.entry.payload()
    }
}

struct Slot<P> {
    signature: RoleSignature,
    entry: Arc<CacheEntry<P>>,
    seq: u64,
    last_access: AtomicU64,
}

#[derive(Serialize, Deserialize)]
struct StoredSemantic<P> {
    signature: RoleSignature,
    difficulty: Difficulty,
    payload: P,
    created_at: DateTime<Utc>,
    seq: u64,
}

/// Tunables for [`SemanticCache`].
#[derive(Debug, Clone, Copy)]
pub struct SemanticConfig {
    pub threshold: f32,
    pub capacity_per_tier: usize,
    pub ttl: Duration,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SEMANTIC_THRESHOLD,
            capacity_per_tier: DEFAULT_SEMANTIC_CAPACITY,
            ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        }
    }
}

/// Similarity-matched reuse of question sets, one shard per difficulty tier.
///
/// Lookups take a shard read lock and never trigger generation. Each shard is bounded
/// and evicts its least recently accessed entry.
pub struct SemanticCache<P> {
    shards: [RwLock<Vec<Arc<Slot<P>>>>; 3],
    metric: Arc<dyn SimilarityMetric>,
    config: SemanticConfig,
    store: Option<Arc<dyn KvStore>>,
    seq: AtomicU64,
    clock: AtomicU64,
}

impl<P> SemanticCache<P>
where
    P: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(config: SemanticConfig) -> Self {
        Self::with_metric(config, Arc::new(WeightedFeatureSimilarity::default()), None)
    }

    pub fn with_metric(
        config: SemanticConfig,
        metric: Arc<dyn SimilarityMetric>,
        store: Option<Arc<dyn KvStore>>,
    ) -> Self {
        Self {
            shards: [
                RwLock::new(Vec::new()),
                RwLock::new(Vec::new()),
                RwLock::new(Vec::new()),
            ],
            metric,
            config,
            store,
            seq: AtomicU64::new(0),
            clock: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &SemanticConfig {
        &self.config
    }

    fn shard(&self, tier: Difficulty) -> &RwLock<Vec<Arc<Slot<P>>>> {
        &self.shards[tier.index()]
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Best candidate in `tier` with `similarity >= threshold`.
    ///
    /// Ties on similarity go to the most recently inserted entry.
    pub fn get(&self, signature: &RoleSignature, tier: Difficulty) -> Option<SemanticHit<P>> {
        let now = Utc::now();
        let shard = self.shard(tier).read();

        let mut best: Option<(&Arc<Slot<P>>, f32)> = None;
        for slot in shard.iter() {
            if slot.entry.is_expired(self.config.ttl, now) {
                continue;
            }
            let similarity = self.metric.similarity(signature, &slot.signature);
            let better = match best {
                None => true,
                Some((current, current_sim)) => {
                    similarity > current_sim || (similarity == current_sim && slot.seq > current.seq)
                }
            };
            if better {
                best = Some((slot, similarity));
            }
        }

        let (slot, similarity) = best?;
        if similarity < self.config.threshold {
            debug!(tier = %tier, best = similarity, "Semantic miss below threshold");
            return None;
        }

        slot.last_access.store(self.tick(), Ordering::Relaxed);
        slot.entry.record_hit();
        Some(SemanticHit {
            entry: Arc::clone(&slot.entry),
            similarity,
        })
    }

    /// Inserts a payload under `signature` in `tier` and writes it through to the store.
    ///
    /// The in-memory entry is kept even when the write-through fails.
    #[instrument(skip(self, signature, payload), fields(tier = %tier))]
    pub async fn put(&self, signature: RoleSignature, tier: Difficulty, payload: P) -> StorageResult<()> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let key = format!("{}{}", SEMANTIC_PREFIX, uuid::Uuid::new_v4().simple());
        let entry = Arc::new(CacheEntry::new(key.clone(), payload));
        let slot = Arc::new(Slot {
            signature,
            entry,
            seq,
            last_access: AtomicU64::new(self.tick()),
        });

        let evicted = self.insert_slot(tier, Arc::clone(&slot));

        let Some(store) = &self.store else {
            return Ok(());
        };

        let record = StoredSemantic {
            signature: slot.signature.clone(),
            difficulty: tier,
            payload: slot.entry.payload(),
            created_at: slot.entry.created_at(),
            seq,
        };
        let expires_at = slot.entry.expires_at(self.config.ttl);
        let written = put_json(store.as_ref(), &key, &record, Some(expires_at)).await;

        for old in evicted {
            if let Err(e) = store.delete(old.entry.key()).await {
                warn!(key = %old.entry.key(), error = %e, "Failed to delete evicted semantic entry");
            }
        }
        written
    }

    fn insert_slot(&self, tier: Difficulty, slot: Arc<Slot<P>>) -> Vec<Arc<Slot<P>>> {
        let mut shard = self.shard(tier).write();
        shard.push(slot);

        let mut evicted = Vec::new();
        while shard.len() > self.config.capacity_per_tier.max(1) {
            let victim = shard
                .iter()
                .enumerate()
                .min_by_key(|(_, s)| (s.last_access.load(Ordering::Relaxed), s.seq))
                .map(|(i, _)| i);
            match victim {
                Some(i) => evicted.push(shard.swap_remove(i)),
                None => break,
            }
        }
        evicted
    }

    /// Reloads persisted entries. Expired and undecodable records are skipped.
    pub async fn hydrate(&self) -> StorageResult<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };

        let now = Utc::now();
        let mut records: Vec<(String, StoredSemantic<P>)> = Vec::new();
        for (key, bytes) in store.scan(SEMANTIC_PREFIX).await? {
            match serde_json::from_slice::<StoredSemantic<P>>(&bytes) {
                Ok(record) if expiry_after(record.created_at, self.config.ttl) > now => {
                    records.push((key, record))
                }
                Ok(_) => debug!(key = %key, "Skipping expired semantic record"),
                Err(e) => warn!(key = %key, error = %e, "Skipping undecodable semantic record"),
            }
        }
        records.sort_by_key(|(_, r)| r.seq);

        let count = records.len();
        for (key, record) in records {
            self.seq.fetch_max(record.seq + 1, Ordering::Relaxed);
            let slot = Arc::new(Slot {
                signature: record.signature,
                entry: Arc::new(CacheEntry::with_created_at(
                    key,
                    record.payload,
                    record.created_at,
                )),
                seq: record.seq,
                last_access: AtomicU64::new(self.tick()),
            });
            for old in self.insert_slot(record.difficulty, slot) {
                if let Err(e) = store.delete(old.entry.key()).await {
                    warn!(key = %old.entry.key(), error = %e, "Failed to delete evicted semantic entry");
                }
            }
        }

        info!(entries = count, "Semantic cache hydrated");
        Ok(count)
    }

    /// Drops expired entries from memory and deletes expired records from the store.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> StorageResult<usize> {
        let mut removed = 0;
        for shard in &self.shards {
            let mut shard = shard.write();
            let before = shard.len();
            shard.retain(|s| !s.entry.is_expired(self.config.ttl, now));
            removed += before - shard.len();
        }

        if let Some(store) = &self.store {
            for key in store.list_expired(SEMANTIC_PREFIX, now).await? {
                if let Err(e) = store.delete(&key).await {
                    warn!(key = %key, error = %e, "Failed to purge semantic entry");
                }
            }
        }
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    pub fn tier_len(&self, tier: Difficulty) -> usize {
        self.shard(tier).read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<P> std::fmt::Debug for SemanticCache<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticCache")
            .field("config", &self.config)
            .field(
                "entries",
                &self.shards.iter().map(|s| s.read().len()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
