use std::collections::BTreeSet;

use super::signature::RoleSignature;

/// Scores how interchangeable two signatures are, in `[0, 1]`.
pub trait SimilarityMetric: Send + Sync {
    fn similarity(&self, a: &RoleSignature, b: &RoleSignature) -> f32;
}

/// Weighted feature overlap: role families 0.4, seniority 0.3, skill domains 0.3.
///
/// A set component where either side extracted nothing scores 0.5. Seniority scores
/// 1.0 on a match and 0.4 otherwise.
#[derive(Debug, Clone, Copy)]
pub struct WeightedFeatureSimilarity {
    pub family_weight: f32,
    pub seniority_weight: f32,
    pub domain_weight: f32,
}

impl WeightedFeatureSimilarity {
    const UNKNOWN_COMPONENT: f32 = 0.5;
    const SENIORITY_MISMATCH: f32 = 0.4;
}

impl Default for WeightedFeatureSimilarity {
    fn default() -> Self {
        Self {
            family_weight: 0.4,
            seniority_weight: 0.3,
            domain_weight: 0.3,
        }
    }
}

impl SimilarityMetric for WeightedFeatureSimilarity {
    fn similarity(&self, a: &RoleSignature, b: &RoleSignature) -> f32 {
        let family = jaccard_or(&a.families, &b.families, Self::UNKNOWN_COMPONENT);
        let seniority = if a.seniority == b.seniority {
            1.0
        } else {
            Self::SENIORITY_MISMATCH
        };
        let domain = jaccard_or(&a.domains, &b.domains, Self::UNKNOWN_COMPONENT);

        let score = family * self.family_weight
            + seniority * self.seniority_weight
            + domain * self.domain_weight;
        score.clamp(0.0, 1.0)
    }
}

/// Plain Jaccard over the signature tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenJaccard;

impl SimilarityMetric for TokenJaccard {
    fn similarity(&self, a: &RoleSignature, b: &RoleSignature) -> f32 {
        jaccard_or(&a.tokens, &b.tokens, 0.0)
    }
}

fn jaccard_or(a: &BTreeSet<String>, b: &BTreeSet<String>, empty: f32) -> f32 {
    if a.is_empty() || b.is_empty() {
        return empty;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f32 / union as f32
}
