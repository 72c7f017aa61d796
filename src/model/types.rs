use serde::{Deserialize, Serialize};

/// A model-produced grade for one answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub score: f32,
    #[serde(default)]
    pub feedback: String,
}

/// Session-level context for a batch evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchContext {
    pub role: String,
    pub description: String,
}

/// One question/answer pair in a batch evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub question: String,
    pub answer: String,
    pub expected_keywords: Vec<String>,
}
