use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use crate::session::Provenance;

pub const INTERVUE_STATUS_HEADER: &str = "X-Intervue-Status";
pub const INTERVUE_STATUS_HEALTHY: &str = "healthy";
pub const INTERVUE_STATUS_READY: &str = "ready";
pub const INTERVUE_STATUS_NOT_READY: &str = "not_ready";
pub const INTERVUE_STATUS_ERROR: &str = "error";

/// How the question set behind a response was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheStatus {
    HitExact,
    HitSemantic,
    MissGenerated,
    MissFallback,
}

impl CacheStatus {
    #[inline]
    pub fn as_header_value(&self) -> &'static str {
        match self {
            CacheStatus::HitExact => "HIT_EXACT",
            CacheStatus::HitSemantic => "HIT_SEMANTIC",
            CacheStatus::MissGenerated => "MISS_GENERATED",
            CacheStatus::MissFallback => "MISS_FALLBACK",
        }
    }

    #[inline]
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheStatus::HitExact | CacheStatus::HitSemantic)
    }
}

impl From<Provenance> for CacheStatus {
    fn from(provenance: Provenance) -> Self {
        match provenance {
            Provenance::CachedExact => CacheStatus::HitExact,
            Provenance::CachedSemantic => CacheStatus::HitSemantic,
            Provenance::Generated => CacheStatus::MissGenerated,
            Provenance::FallbackBank => CacheStatus::MissFallback,
        }
    }
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_header_value())
    }
}

/// A cached payload plus access metadata.
///
/// The payload is immutable after construction. Entries are shared as `Arc`s, so
/// eviction only drops the cache's reference; readers keep theirs.
#[derive(Debug)]
pub struct CacheEntry<P> {
    key: String,
    payload: P,
    created_at: DateTime<Utc>,
    last_access_ms: AtomicI64,
    hits: AtomicU64,
}

impl<P> CacheEntry<P> {
    pub fn new(key: impl Into<String>, payload: P) -> Self {
        Self::with_created_at(key, payload, Utc::now())
    }

    pub fn with_created_at(key: impl Into<String>, payload: P, created_at: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            payload,
            created_at,
            last_access_ms: AtomicI64::new(created_at.timestamp_millis()),
            hits: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[inline]
    pub fn payload(&self) -> &P {
        &self.payload
    }

    #[inline]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_access(&self) -> DateTime<Utc> {
        let ms = self.last_access_ms.load(Ordering::Relaxed);
        Utc.timestamp_millis_opt(ms).single().unwrap_or(self.created_at)
    }

    #[inline]
    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Bumps the hit counter and last-access time.
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.last_access_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    /// Absolute expiry for a given TTL.
    pub fn expires_at(&self, ttl: Duration) -> DateTime<Utc> {
        expiry_after(self.created_at, ttl)
    }

    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        self.expires_at(ttl) <= now
    }
}

pub(crate) fn expiry_after(start: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| start.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
