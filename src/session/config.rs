use std::time::Duration;

use crate::config::ConfigError;
use crate::constants::*;

/// Engine tunables. Build with [`EngineConfig::default`] and the `with_*` methods, or
/// take the slice of a loaded [`Config`](crate::config::Config).
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub exact_capacity: u64,
    /// Per difficulty tier.
    pub semantic_capacity: usize,
    pub cache_ttl: Duration,
    pub semantic_threshold: f32,
    pub difficulty_window: usize,
    pub standard_questions: usize,
    pub rapid_fire_questions: usize,
    pub rapid_fire_time_limit: Duration,
    pub remote_timeout: Duration,
    pub batch_timeout: Duration,
    pub min_answer_length: usize,
    pub session_retention: Duration,
    pub inactivity_timeout: Duration,
    pub reaper_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            exact_capacity: DEFAULT_EXACT_CAPACITY,
            semantic_capacity: DEFAULT_SEMANTIC_CAPACITY,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            semantic_threshold: DEFAULT_SEMANTIC_THRESHOLD,
            difficulty_window: DEFAULT_DIFFICULTY_WINDOW,
            standard_questions: DEFAULT_STANDARD_QUESTIONS,
            rapid_fire_questions: DEFAULT_RAPID_FIRE_QUESTIONS,
            rapid_fire_time_limit: Duration::from_secs(DEFAULT_RAPID_FIRE_TIME_LIMIT_SECS),
            remote_timeout: Duration::from_secs(DEFAULT_REMOTE_TIMEOUT_SECS),
            batch_timeout: Duration::from_secs(DEFAULT_BATCH_TIMEOUT_SECS),
            min_answer_length: DEFAULT_MIN_ANSWER_LENGTH,
            session_retention: Duration::from_secs(DEFAULT_SESSION_RETENTION_SECS),
            inactivity_timeout: Duration::from_secs(DEFAULT_INACTIVITY_TIMEOUT_SECS),
            reaper_interval: Duration::from_secs(DEFAULT_REAPER_INTERVAL_SECS),
        }
    }
}

impl EngineConfig {
    pub fn with_exact_capacity(mut self, capacity: u64) -> Self {
        self.exact_capacity = capacity;
        self
    }

    pub fn with_semantic_capacity(mut self, capacity: usize) -> Self {
        self.semantic_capacity = capacity;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_semantic_threshold(mut self, threshold: f32) -> Self {
        self.semantic_threshold = threshold;
        self
    }

    pub fn with_difficulty_window(mut self, window: usize) -> Self {
        self.difficulty_window = window;
        self
    }

    pub fn with_standard_questions(mut self, count: usize) -> Self {
        self.standard_questions = count;
        self
    }

    pub fn with_rapid_fire_questions(mut self, count: usize) -> Self {
        self.rapid_fire_questions = count;
        self
    }

    pub fn with_rapid_fire_time_limit(mut self, limit: Duration) -> Self {
        self.rapid_fire_time_limit = limit;
        self
    }

    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    pub fn with_batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout = timeout;
        self
    }

    pub fn with_min_answer_length(mut self, chars: usize) -> Self {
        self.min_answer_length = chars;
        self
    }

    pub fn with_session_retention(mut self, retention: Duration) -> Self {
        self.session_retention = retention;
        self
    }

    pub fn with_inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = timeout;
        self
    }

    pub fn with_reaper_interval(mut self, interval: Duration) -> Self {
        self.reaper_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn out_of_range(name: &'static str, reason: &str) -> Result<(), ConfigError> {
            Err(ConfigError::OutOfRange {
                name,
                reason: reason.to_string(),
            })
        }

        if !(self.semantic_threshold > 0.0 && self.semantic_threshold <= 1.0) {
            return out_of_range("semantic_threshold", "must be in (0, 1]");
        }
        if self.difficulty_window == 0 {
            return out_of_range("difficulty_window", "must be at least 1");
        }
        if self.exact_capacity == 0 {
            return out_of_range("exact_capacity", "must be at least 1");
        }
        if self.semantic_capacity == 0 {
            return out_of_range("semantic_capacity", "must be at least 1");
        }
        if self.standard_questions == 0 {
            return out_of_range("standard_questions", "must be at least 1");
        }
        if self.rapid_fire_questions == 0 {
            return out_of_range("rapid_fire_questions", "must be at least 1");
        }
        if self.rapid_fire_time_limit.is_zero() {
            return out_of_range("rapid_fire_time_limit", "must be non-zero");
        }
        if self.remote_timeout.is_zero() || self.batch_timeout.is_zero() {
            return out_of_range("remote_timeout", "model timeouts must be non-zero");
        }
        if self.cache_ttl.is_zero() {
            return out_of_range("cache_ttl", "must be non-zero");
        }
        Ok(())
    }
}
