//! Two-tier question-set cache: exact fingerprint match, then semantic role match.

pub mod exact;
pub mod semantic;
pub mod types;


pub use exact::ExactMatchCache;
pub use semantic::{
    RoleSignature, SemanticCache, SemanticConfig, SemanticHit, Seniority, SimilarityMetric,
    TokenJaccard, WeightedFeatureSimilarity,
};
pub use types::{
    CacheEntry, CacheStatus, INTERVUE_STATUS_ERROR, INTERVUE_STATUS_HEADER,
    INTERVUE_STATUS_HEALTHY, INTERVUE_STATUS_NOT_READY, INTERVUE_STATUS_READY,
};
