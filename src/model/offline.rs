use async_trait::async_trait;

use super::error::{ModelError, ModelResult};
use super::types::{BatchContext, BatchItem, Evaluation};
use super::QuestionModel;
use crate::session::{Difficulty, QuestionRecord, QuestionSet};

/// A model that is never reachable. Every session then runs on the bank and the
/// keyword evaluator.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineModel;

const OFFLINE: &str = "no model configured";

#[async_trait]
impl QuestionModel for OfflineModel {
    fn name(&self) -> &str {
        "offline"
    }

    fn is_remote(&self) -> bool {
        false
    }

    async fn generate_question_set(
        &self,
        _role: &str,
        _description: &str,
        _difficulty: Difficulty,
        _count: usize,
    ) -> ModelResult<QuestionSet> {
        Err(ModelError::Unavailable(OFFLINE.into()))
    }

    async fn evaluate_answer(
        &self,
        _question: &QuestionRecord,
        _answer: &str,
    ) -> ModelResult<Evaluation> {
        Err(ModelError::Unavailable(OFFLINE.into()))
    }

    async fn evaluate_batch(
        &self,
        _context: &BatchContext,
        _items: &[BatchItem],
    ) -> ModelResult<Vec<Evaluation>> {
        Err(ModelError::Unavailable(OFFLINE.into()))
    }
}
