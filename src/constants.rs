//! Cross-cutting, shared constants.
//!
//! Runtime-tunable values start here and can be overridden through
//! [`Config`](crate::config::Config) / [`EngineConfig`](crate::session::EngineConfig).

/// Inclusive lower bound a semantic candidate must reach to be reused.
pub const DEFAULT_SEMANTIC_THRESHOLD: f32 = 0.80;

/// Trailing window of scores the difficulty controller averages.
pub const DEFAULT_DIFFICULTY_WINDOW: usize = 3;

/// Average at or above which the next question is `hard`.
pub const HARD_TIER_MIN_AVERAGE: f32 = 8.0;

/// Average at or above which the next question is `medium`.
pub const MEDIUM_TIER_MIN_AVERAGE: f32 = 6.0;

pub const DEFAULT_EXACT_CAPACITY: u64 = 500;

/// Per-tier capacity of the semantic cache.
pub const DEFAULT_SEMANTIC_CAPACITY: usize = 500;

/// 24 hours.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 24 * 60 * 60;

pub const DEFAULT_STANDARD_QUESTIONS: usize = 4;

pub const DEFAULT_RAPID_FIRE_QUESTIONS: usize = 10;

pub const DEFAULT_RAPID_FIRE_TIME_LIMIT_SECS: u64 = 60;

pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 20;

pub const DEFAULT_BATCH_TIMEOUT_SECS: u64 = 60;

/// Answers shorter than this (in characters) score at most [`SHORT_ANSWER_SCORE_CAP`].
pub const DEFAULT_MIN_ANSWER_LENGTH: usize = 10;

pub const SHORT_ANSWER_SCORE_CAP: f32 = 3.0;

pub const MAX_SCORE: f32 = 10.0;

/// How long a completed or abandoned session is kept before deletion.
pub const DEFAULT_SESSION_RETENTION_SECS: u64 = 7 * 24 * 60 * 60;

/// Idle time after which an in-progress session is abandoned.
pub const DEFAULT_INACTIVITY_TIMEOUT_SECS: u64 = 60 * 60;

pub const DEFAULT_REAPER_INTERVAL_SECS: u64 = 60;

/// Storage key prefixes. Each consumer of the shared store owns one.
pub mod keys {
    pub const EXACT_PREFIX: &str = "exact:";
    pub const SEMANTIC_PREFIX: &str = "semantic:";
    pub const SESSION_PREFIX: &str = "session:";
}

/// Rating thresholds applied to the final average.
pub mod rating {
    pub const HIRE_MIN_AVERAGE: f32 = 8.0;
    pub const CONSIDER_MIN_AVERAGE: f32 = 6.0;

    pub const HIRE: &str = "HIRE";
    pub const CONSIDER: &str = "CONSIDER";
    pub const TRAIN: &str = "TRAIN";
}
