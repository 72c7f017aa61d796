use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Resolution and evaluation counters, shared by all sessions.
#[derive(Debug, Default)]
pub struct EngineStats {
    exact_hits: AtomicU64,
    semantic_hits: AtomicU64,
    cache_misses: AtomicU64,
    remote_generations: AtomicU64,
    remote_failures: AtomicU64,
    bank_fallbacks: AtomicU64,
    model_evaluations: AtomicU64,
    fallback_evaluations: AtomicU64,
    question_timeouts: AtomicU64,
    remote_calls: AtomicU64,
    storage_failures: AtomicU64,
}

/// Point-in-time copy of [`EngineStats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub exact_hits: u64,
    pub semantic_hits: u64,
    pub cache_misses: u64,
    pub remote_generations: u64,
    pub remote_failures: u64,
    pub bank_fallbacks: u64,
    pub model_evaluations: u64,
    pub fallback_evaluations: u64,
    pub question_timeouts: u64,
    /// Every model request made: generations, single evaluations and batches.
    pub remote_calls: u64,
    /// Cache-tier store operations that failed and were treated as a miss.
    pub storage_failures: u64,
    /// Generation calls avoided by either cache tier.
    pub api_calls_saved: u64,
    pub hit_rate: f64,
    pub cache_efficiency: CacheEfficiency,
    /// Filled in by the orchestrator; zero from [`EngineStats::snapshot`].
    pub exact_entries: u64,
    pub semantic_entries: u64,
}

/// Coarse band for the cache hit rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheEfficiency {
    NoData,
    WarmingUp,
    Fair,
    Good,
    Excellent,
}

impl CacheEfficiency {
    pub fn from_hit_rate(lookups: u64, hit_rate: f64) -> Self {
        match hit_rate {
            _ if lookups == 0 => CacheEfficiency::NoData,
            r if r >= 0.8 => CacheEfficiency::Excellent,
            r if r >= 0.6 => CacheEfficiency::Good,
            r if r >= 0.4 => CacheEfficiency::Fair,
            _ => CacheEfficiency::WarmingUp,
        }
    }
}

macro_rules! counter {
    ($($name:ident => $field:ident),* $(,)?) => {
        $(
            #[inline]
            pub fn $name(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        )*
    };
}

impl EngineStats {
    counter! {
        record_exact_hit => exact_hits,
        record_semantic_hit => semantic_hits,
        record_cache_miss => cache_misses,
        record_remote_generation => remote_generations,
        record_remote_failure => remote_failures,
        record_bank_fallback => bank_fallbacks,
        record_model_evaluation => model_evaluations,
        record_fallback_evaluation => fallback_evaluations,
        record_question_timeout => question_timeouts,
        record_remote_call => remote_calls,
        record_storage_failure => storage_failures,
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let exact_hits = self.exact_hits.load(Ordering::Relaxed);
        let semantic_hits = self.semantic_hits.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses.load(Ordering::Relaxed);
        let lookups = exact_hits + semantic_hits + cache_misses;

        let hit_rate = if lookups == 0 {
            0.0
        } else {
            (exact_hits + semantic_hits) as f64 / lookups as f64
        };

        StatsSnapshot {
            exact_hits,
            semantic_hits,
            cache_misses,
            remote_generations: self.remote_generations.load(Ordering::Relaxed),
            remote_failures: self.remote_failures.load(Ordering::Relaxed),
            bank_fallbacks: self.bank_fallbacks.load(Ordering::Relaxed),
            model_evaluations: self.model_evaluations.load(Ordering::Relaxed),
            fallback_evaluations: self.fallback_evaluations.load(Ordering::Relaxed),
            question_timeouts: self.question_timeouts.load(Ordering::Relaxed),
            remote_calls: self.remote_calls.load(Ordering::Relaxed),
            storage_failures: self.storage_failures.load(Ordering::Relaxed),
            api_calls_saved: exact_hits + semantic_hits,
            hit_rate,
            cache_efficiency: CacheEfficiency::from_hit_rate(lookups, hit_rate),
            exact_entries: 0,
            semantic_entries: 0,
        }
    }
}
