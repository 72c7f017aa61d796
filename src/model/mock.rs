use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::error::{ModelError, ModelResult};
use super::types::{BatchContext, BatchItem, Evaluation};
use super::QuestionModel;
use crate::session::{Difficulty, QuestionRecord, QuestionSet};

/// Test double that replays queued responses.
///
/// An empty queue answers with [`ModelError::Unavailable`]. An optional delay is applied
/// before every call, which lets tests drive the engine's timeouts.
#[derive(Default)]
pub struct ScriptedModel {
    generations: Mutex<VecDeque<ModelResult<QuestionSet>>>,
    evaluations: Mutex<VecDeque<ModelResult<Evaluation>>>,
    batches: Mutex<VecDeque<ModelResult<Vec<Evaluation>>>>,
    delay: Mutex<Option<Duration>>,
    generate_calls: AtomicUsize,
    evaluate_calls: AtomicUsize,
    batch_calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_generation(&self, result: ModelResult<QuestionSet>) -> &Self {
        self.generations.lock().push_back(result);
        self
    }

    pub fn push_evaluation(&self, result: ModelResult<Evaluation>) -> &Self {
        self.evaluations.lock().push_back(result);
        self
    }

    pub fn push_score(&self, score: f32) -> &Self {
        self.push_evaluation(Ok(Evaluation {
            score,
            feedback: format!("scripted {}", score),
        }))
    }

    pub fn push_batch(&self, result: ModelResult<Vec<Evaluation>>) -> &Self {
        self.batches.lock().push_back(result);
        self
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn evaluate_calls(&self) -> usize {
        self.evaluate_calls.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn next<T>(queue: &Mutex<VecDeque<ModelResult<T>>>) -> ModelResult<T> {
        queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::Unavailable("script exhausted".into())))
    }
}

#[async_trait]
impl QuestionModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate_question_set(
        &self,
        _role: &str,
        _description: &str,
        _difficulty: Difficulty,
        _count: usize,
    ) -> ModelResult<QuestionSet> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Self::next(&self.generations)
    }

    async fn evaluate_answer(
        &self,
        _question: &QuestionRecord,
        _answer: &str,
    ) -> ModelResult<Evaluation> {
        self.evaluate_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Self::next(&self.evaluations)
    }

    async fn evaluate_batch(
        &self,
        _context: &BatchContext,
        _items: &[BatchItem],
    ) -> ModelResult<Vec<Evaluation>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Self::next(&self.batches)
    }
}
