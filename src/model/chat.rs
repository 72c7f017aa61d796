use async_trait::async_trait;
use genai::Client;
use genai::chat::{ChatMessage, ChatRequest};
use tracing::{debug, instrument};

use super::error::{ModelError, ModelResult};
use super::prompts;
use super::types::{BatchContext, BatchItem, Evaluation};
use super::QuestionModel;
use crate::session::{Difficulty, QuestionRecord, QuestionSet};

/// [`QuestionModel`] backed by any chat model the `genai` crate can reach.
///
/// Provider credentials come from the usual environment variables (`OPENAI_API_KEY`,
/// `GEMINI_API_KEY`, ...), resolved by `genai` from the model name.
pub struct GenaiModel {
    client: Client,
    model: String,
}

impl GenaiModel {
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_client(Client::default(), model)
    }

    pub fn with_client(client: Client, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    async fn complete(&self, prompt: String) -> ModelResult<String> {
        let request = ChatRequest::new(vec![
            ChatMessage::system(prompts::SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ]);

        let response = self
            .client
            .exec_chat(&self.model, request, None)
            .await
            .map_err(|e| ModelError::Request(e.to_string()))?;

        let text = response
            .first_text()
            .ok_or_else(|| ModelError::InvalidResponse("empty completion".into()))?;
        debug!(model = %self.model, chars = text.len(), "Model responded");
        Ok(text.to_string())
    }
}

impl std::fmt::Debug for GenaiModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenaiModel")
            .field("model", &self.model)
            .finish()
    }
}

#[async_trait]
impl QuestionModel for GenaiModel {
    fn name(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, description), fields(model = %self.model))]
    async fn generate_question_set(
        &self,
        role: &str,
        description: &str,
        difficulty: Difficulty,
        count: usize,
    ) -> ModelResult<QuestionSet> {
        let text = self
            .complete(prompts::question_set_prompt(role, description, difficulty, count))
            .await?;
        prompts::parse_question_set(&text, difficulty)
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn evaluate_answer(
        &self,
        question: &QuestionRecord,
        answer: &str,
    ) -> ModelResult<Evaluation> {
        let text = self
            .complete(prompts::evaluation_prompt(
                &question.text,
                answer,
                &question.expected_keywords,
            ))
            .await?;
        prompts::parse_evaluation(&text)
    }

    #[instrument(skip_all, fields(model = %self.model, answers = items.len()))]
    async fn evaluate_batch(
        &self,
        context: &BatchContext,
        items: &[BatchItem],
    ) -> ModelResult<Vec<Evaluation>> {
        let text = self.complete(prompts::batch_prompt(context, items)).await?;
        prompts::parse_batch(&text, items.len())
    }
}
