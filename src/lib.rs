//! Intervue library crate (used by the server and integration tests).
//!
//! # Public API Surface
//!
//! ## Core Types
//! - [`Config`], [`ConfigError`] - Server configuration
//! - [`SessionOrchestrator`], [`EngineConfig`], [`Reaper`] - Session lifecycle
//! - [`Session`], [`SessionReport`], [`ScoreRecord`] - Session state and results
//!
//! ## Question Resolution
//! - [`ExactMatchCache`], [`SemanticCache`], [`RoleSignature`] - The two cache tiers
//! - [`QuestionBank`] - Curated offline questions
//! - [`QuestionModel`], [`GenaiModel`], [`OfflineModel`] - The remote model seam
//!
//! ## Scoring
//! - [`DifficultyController`] - Moving-average tier selection
//! - [`FallbackEvaluator`] - Keyword-overlap scoring
//!
//! ## Storage
//! - [`KvStore`], [`FsKvStore`], [`MemoryKvStore`] - Durable key-value backends
//!
//! ## Test/Mock Support
//! [`ScriptedModel`](model::ScriptedModel) and
//! [`FaultyKvStore`](storage::FaultyKvStore) are available behind
//! `#[cfg(any(test, feature = "mock"))]`.

pub mod bank;
pub mod cache;
pub mod config;
pub mod constants;
pub mod difficulty;
pub mod evaluator;
pub mod gateway;
pub mod hashing;
pub mod model;
pub mod session;
pub mod storage;

pub use bank::{BankError, QuestionBank};
pub use cache::{
    CacheEntry, CacheStatus, ExactMatchCache, INTERVUE_STATUS_ERROR, INTERVUE_STATUS_HEADER,
    INTERVUE_STATUS_HEALTHY, INTERVUE_STATUS_NOT_READY, INTERVUE_STATUS_READY, RoleSignature,
    SemanticCache, SemanticConfig, SimilarityMetric, WeightedFeatureSimilarity,
};
pub use config::{Config, ConfigError};
pub use difficulty::DifficultyController;
pub use evaluator::FallbackEvaluator;
pub use hashing::{fingerprint, fingerprint_hex, hash_to_u64, normalize_text};
#[cfg(any(test, feature = "mock"))]
pub use model::ScriptedModel;
pub use model::{GenaiModel, ModelError, OfflineModel, QuestionModel};
pub use session::{
    CacheEfficiency, Difficulty, EngineConfig, EngineError, EngineResult, Reaper, ScoreRecord,
    ScoreSource, Session, SessionMode, SessionOrchestrator, SessionReport, SessionStatus,
    SessionUpdate, StatsSnapshot,
};
pub use storage::{FsKvStore, KvStore, MemoryKvStore, StorageError};
