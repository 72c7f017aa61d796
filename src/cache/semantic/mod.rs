//! Semantic tier: reuse a question set written for a similar role.

pub mod cache;
pub mod signature;
pub mod similarity;


pub use cache::{SemanticCache, SemanticConfig, SemanticHit};
pub use signature::{RoleSignature, Seniority};
pub use similarity::{SimilarityMetric, TokenJaccard, WeightedFeatureSimilarity};
