//! The external generative model, behind a narrow trait.
//!
//! Every failure is a [`ModelError`]; callers treat all of them as "remote unavailable"
//! and fall back locally.

pub mod chat;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod offline;
pub mod prompts;
pub mod types;

pub use chat::GenaiModel;
pub use error::{ModelError, ModelResult};
#[cfg(any(test, feature = "mock"))]
pub use mock::ScriptedModel;
pub use offline::OfflineModel;
pub use types::{BatchContext, BatchItem, Evaluation};

use async_trait::async_trait;

use crate::session::{Difficulty, QuestionRecord, QuestionSet};

#[async_trait]
pub trait QuestionModel: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Whether calls leave the process; only these count towards `remote_calls`.
    fn is_remote(&self) -> bool {
        true
    }

    /// Up to `count` questions for a role at `difficulty`.
    async fn generate_question_set(
        &self,
        role: &str,
        description: &str,
        difficulty: Difficulty,
        count: usize,
    ) -> ModelResult<QuestionSet>;

    async fn evaluate_answer(&self, question: &QuestionRecord, answer: &str)
    -> ModelResult<Evaluation>;

    /// One evaluation per item, in order.
    async fn evaluate_batch(
        &self,
        context: &BatchContext,
        items: &[BatchItem],
    ) -> ModelResult<Vec<Evaluation>>;
}
