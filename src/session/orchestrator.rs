//! Session lifecycle: question resolution, answer scoring, rapid-fire timers and
//! persistence.
//!
//! Every mutating operation takes the session's slot lock, loads the session from the
//! store, applies the change and writes it back before releasing the lock.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio::time::{Instant, timeout};
use tracing::{debug, error, info, instrument, warn};

use super::config::EngineConfig;
use super::error::{EngineError, EngineResult};
use super::report::build_report;
use super::slots::{SessionSlot, SlotMap};
use super::stats::{EngineStats, StatsSnapshot};
use super::types::{
    AnswerRecord, Provenance, QuestionRecord, QuestionSet, QuestionTemplate, ScoreRecord,
    ScoreSource, Session, SessionMode, SessionStatus,
};
use crate::bank::QuestionBank;
use crate::cache::types::expiry_after;
use crate::cache::{
    CacheStatus, ExactMatchCache, RoleSignature, SemanticCache, SemanticConfig, SimilarityMetric,
    WeightedFeatureSimilarity,
};
use crate::constants::MAX_SCORE;
use crate::constants::keys::SESSION_PREFIX;
use crate::difficulty::DifficultyController;
use crate::evaluator::FallbackEvaluator;
use crate::hashing::{fingerprint, hash_to_u64};
use crate::model::{BatchContext, BatchItem, ModelError, ModelResult, QuestionModel};
use crate::storage::{KvStore, get_json, put_json};

/// Result of a mutating session operation.
#[derive(Debug, Clone)]
pub struct SessionUpdate {
    /// The session as persisted after the operation.
    pub session: Session,
    /// How the newest pending question was resolved, when one was issued.
    pub resolution: Option<CacheStatus>,
    /// Score recorded for the submitted answer, when scored immediately.
    pub score: Option<ScoreRecord>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapSummary {
    pub abandoned: usize,
    pub deleted: usize,
    pub cache_entries_purged: usize,
}

struct Inner {
    config: EngineConfig,
    store: Arc<dyn KvStore>,
    exact: ExactMatchCache<QuestionSet>,
    semantic: SemanticCache<QuestionSet>,
    bank: QuestionBank,
    model: Arc<dyn QuestionModel>,
    difficulty: DifficultyController,
    slots: SlotMap,
    stats: EngineStats,
}

/// Owns session state transitions. Cheap to clone.
#[derive(Clone)]
pub struct SessionOrchestrator {
    inner: Arc<Inner>,
}

impl SessionOrchestrator {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn KvStore>,
        bank: QuestionBank,
        model: Arc<dyn QuestionModel>,
    ) -> Self {
        Self::with_metric(
            config,
            store,
            bank,
            model,
            Arc::new(WeightedFeatureSimilarity::default()),
        )
    }

    pub fn with_metric(
        config: EngineConfig,
        store: Arc<dyn KvStore>,
        bank: QuestionBank,
        model: Arc<dyn QuestionModel>,
        metric: Arc<dyn SimilarityMetric>,
    ) -> Self {
        let exact = ExactMatchCache::with_config(
            config.exact_capacity,
            config.cache_ttl,
            Some(Arc::clone(&store)),
        );
        let semantic = SemanticCache::with_metric(
            SemanticConfig {
                threshold: config.semantic_threshold,
                capacity_per_tier: config.semantic_capacity,
                ttl: config.cache_ttl,
            },
            metric,
            Some(Arc::clone(&store)),
        );

        Self {
            inner: Arc::new(Inner {
                difficulty: DifficultyController::new(config.difficulty_window),
                config,
                store,
                exact,
                semantic,
                bank,
                model,
                slots: SlotMap::new(),
                stats: EngineStats::default(),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn model_name(&self) -> &str {
        self.inner.model.name()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.exact.run_pending_tasks();
        StatsSnapshot {
            exact_entries: self.inner.exact.len(),
            semantic_entries: self.inner.semantic.len() as u64,
            ..self.inner.stats.snapshot()
        }
    }

    /// Reloads persisted semantic entries. Returns how many were restored.
    pub async fn hydrate(&self) -> EngineResult<usize> {
        Ok(self.inner.semantic.hydrate().await?)
    }

    #[cfg(test)]
    pub(crate) fn exact_cache(&self) -> &ExactMatchCache<QuestionSet> {
        &self.inner.exact
    }

    #[cfg(test)]
    pub(crate) fn semantic_cache(&self) -> &SemanticCache<QuestionSet> {
        &self.inner.semantic
    }

    #[cfg(test)]
    pub(crate) fn open_slots(&self) -> u64 {
        self.inner.slots.len()
    }

    #[cfg(test)]
    pub(crate) fn armed_timer(&self, session_id: &str) -> Option<usize> {
        self.inner
            .slots
            .peek(session_id)
            .and_then(|slot| slot.armed_index())
    }

    #[instrument(skip(self, description), fields(role = %role, mode = ?mode))]
    pub async fn start_session(
        &self,
        role: &str,
        description: Option<&str>,
        mode: SessionMode,
    ) -> EngineResult<SessionUpdate> {
        let role = role.trim();
        if role.is_empty() {
            return Err(EngineError::invalid("role must not be empty"));
        }
        let description = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        let count = match mode {
            SessionMode::Standard => self.inner.config.standard_questions,
            SessionMode::RapidFire => self.inner.config.rapid_fire_questions,
        };
        let mut session = Session::new(role, description, mode, count);

        let slot = self.inner.slots.get(&session.id);
        let _guard = slot.lock().await;

        match mode {
            SessionMode::Standard => {
                let question = self.resolve_question(&session).await?;
                session.questions.push(question);
            }
            SessionMode::RapidFire => self.resolve_question_set(&mut session).await?,
        }
        session.status = SessionStatus::InProgress;
        session.touch();

        if let Err(e) = self.persist(&session).await {
            self.inner.slots.remove(&session.id);
            return Err(e);
        }
        if mode == SessionMode::RapidFire {
            self.arm_timer(&slot, &session.id, 0);
        }

        let resolution: Option<CacheStatus> = session.current_question().map(|q| q.provenance.into());
        info!(
            session_id = %session.id,
            questions = session.question_count,
            resolution = ?resolution,
            "Session started"
        );
        Ok(SessionUpdate {
            session,
            resolution,
            score: None,
        })
    }

    /// Answers whichever question is pending.
    pub async fn submit_answer(&self, session_id: &str, answer: &str) -> EngineResult<SessionUpdate> {
        self.submit_answer_at(session_id, None, answer).await
    }

    /// Answers `question_index`, or the pending question when `None`.
    ///
    /// Fails with [`EngineError::QuestionClosed`] when `question_index` is no longer
    /// pending, e.g. after its rapid-fire timer fired first.
    #[instrument(skip(self, answer), fields(session_id = %session_id))]
    pub async fn submit_answer_at(
        &self,
        session_id: &str,
        question_index: Option<usize>,
        answer: &str,
    ) -> EngineResult<SessionUpdate> {
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(EngineError::invalid("answer must not be empty"));
        }

        let slot = self.inner.slots.get(session_id);
        let _guard = slot.lock().await;
        let mut session = self.load_active(session_id).await?;

        let pending = session.current_index();
        if let Some(question_index) = question_index
            && question_index != pending
        {
            return Err(EngineError::QuestionClosed {
                question_index,
                pending,
            });
        }
        if session.mode == SessionMode::RapidFire {
            slot.cancel_timer();
        }

        let outcome = async {
            let score = self.apply_answer(&mut session, answer, false).await?;
            self.persist(&session).await?;
            Ok::<_, EngineError>(score)
        }
        .await;
        self.rearm(&slot, &session, pending, outcome.is_ok());
        let score = outcome?;

        let resolution: Option<CacheStatus> = match session.mode {
            SessionMode::Standard => session.current_question().map(|q| q.provenance.into()),
            SessionMode::RapidFire => None,
        };
        debug!(
            answered = session.answers.len(),
            status = ?session.status,
            difficulty = %session.difficulty,
            "Answer recorded"
        );
        Ok(SessionUpdate {
            session,
            resolution,
            score,
        })
    }

    /// Records several rapid-fire answers at once, in question order.
    ///
    /// Empty strings stand for skipped questions and score zero.
    #[instrument(skip(self, answers), fields(session_id = %session_id, count = answers.len()))]
    pub async fn submit_batch(
        &self,
        session_id: &str,
        answers: &[String],
    ) -> EngineResult<SessionUpdate> {
        if answers.is_empty() {
            return Err(EngineError::invalid("at least one answer is required"));
        }

        let slot = self.inner.slots.get(session_id);
        let _guard = slot.lock().await;
        let mut session = self.load_active(session_id).await?;

        if session.mode != SessionMode::RapidFire {
            return Err(EngineError::invalid(
                "batch submission is only available in rapid-fire mode",
            ));
        }
        let remaining = session
            .question_count
            .saturating_sub(session.current_index());
        if answers.len() > remaining {
            return Err(EngineError::InvalidInput(format!(
                "{} answers submitted but only {} questions remain",
                answers.len(),
                remaining
            )));
        }

        let pending = session.current_index();
        slot.cancel_timer();

        let outcome = async {
            for answer in answers {
                self.apply_answer(&mut session, answer.trim(), false).await?;
            }
            self.persist(&session).await
        }
        .await;
        self.rearm(&slot, &session, pending, outcome.is_ok());
        outcome?;

        Ok(SessionUpdate {
            session,
            resolution: None,
            score: None,
        })
    }

    /// Read-only snapshot.
    pub async fn get_session(&self, session_id: &str) -> EngineResult<Session> {
        self.load(session_id)
            .await?
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))
    }

    /// Ends an in-progress session early. Answers scored so far go into the report.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn abandon_session(&self, session_id: &str) -> EngineResult<Session> {
        let slot = self.inner.slots.get(session_id);
        let _guard = slot.lock().await;
        let mut session = self.load_active(session_id).await?;

        let pending = session.current_index();
        slot.cancel_timer();
        mark_abandoned(&mut session);

        let outcome = self.persist(&session).await;
        self.rearm(&slot, &session, pending, outcome.is_ok());
        outcome?;

        info!(answered = session.answers.len(), "Session abandoned");
        Ok(session)
    }

    /// Submits an empty answer for `question_index` if it is still pending.
    ///
    /// Driven by the rapid-fire timer. Returns `false` when the question was already
    /// answered, or the session is gone or terminal.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn expire_question(
        &self,
        session_id: &str,
        question_index: usize,
    ) -> EngineResult<bool> {
        let slot = self.inner.slots.get(session_id);
        let _guard = slot.lock().await;
        slot.disarm(question_index);

        let Some(mut session) = self.load(session_id).await? else {
            self.inner.slots.remove(session_id);
            return Ok(false);
        };
        if session.status.is_terminal()
            || session.mode != SessionMode::RapidFire
            || session.current_index() != question_index
        {
            return Ok(false);
        }

        self.inner.stats.record_question_timeout();
        info!(question_index, "Question timed out");

        let outcome = async {
            self.apply_answer(&mut session, "", true).await?;
            self.persist(&session).await
        }
        .await;
        self.rearm(&slot, &session, question_index, outcome.is_ok());
        outcome?;
        Ok(true)
    }

    /// One maintenance pass: deletes terminal sessions past retention, abandons idle
    /// sessions and purges expired cache entries.
    #[instrument(skip(self))]
    pub async fn reap(&self) -> EngineResult<ReapSummary> {
        let now = Utc::now();
        let store = self.inner.store.as_ref();
        let mut summary = ReapSummary::default();

        for key in store.list_expired(SESSION_PREFIX, now).await? {
            if store.delete(&key).await? {
                summary.deleted += 1;
            }
            if let Some(id) = key.strip_prefix(SESSION_PREFIX) {
                self.inner.slots.remove(id);
            }
        }

        let inactivity = self.inner.config.inactivity_timeout;
        for (key, bytes) in store.scan(SESSION_PREFIX).await? {
            let session: Session = match serde_json::from_slice(&bytes) {
                Ok(session) => session,
                Err(e) => {
                    warn!(key = %key, error = %e, "Skipping undecodable session record");
                    continue;
                }
            };
            if session.status.is_terminal() || expiry_after(session.updated_at, inactivity) > now {
                continue;
            }
            if self.abandon_idle(&session.id).await? {
                summary.abandoned += 1;
            }
        }

        summary.cache_entries_purged += self.inner.exact.purge_expired(now).await.unwrap_or_else(|e| {
            error!(error = %e, "Exact cache purge failed");
            0
        });
        summary.cache_entries_purged +=
            self.inner.semantic.purge_expired(now).await.unwrap_or_else(|e| {
                error!(error = %e, "Semantic cache purge failed");
                0
            });

        if summary != ReapSummary::default() {
            info!(
                deleted = summary.deleted,
                abandoned = summary.abandoned,
                purged = summary.cache_entries_purged,
                "Reaper pass complete"
            );
        }
        Ok(summary)
    }

    /// Records `answer` against the pending question and advances the session.
    ///
    /// Standard sessions are scored now, re-tiered and given their next question.
    /// Rapid-fire sessions defer scoring to one batch pass after the last answer;
    /// an empty rapid-fire answer is scored zero on the spot.
    async fn apply_answer(
        &self,
        session: &mut Session,
        answer: &str,
        timed_out: bool,
    ) -> EngineResult<Option<ScoreRecord>> {
        let index = session.current_index();
        let Some(question) = session.questions.get(index).cloned() else {
            return Err(EngineError::invalid("no question is awaiting an answer"));
        };

        session.answers.push(AnswerRecord {
            question_index: index,
            text: answer.to_string(),
            submitted_at: Utc::now(),
            timed_out,
        });
        session.touch();

        let score = match session.mode {
            SessionMode::Standard => {
                let score = self.evaluate(index, &question, answer).await;
                session.record_score(score.clone());
                session.difficulty = self.inner.difficulty.next_tier(&session.scores);
                if !session.is_answered_in_full() {
                    let next = self.resolve_question(session).await?;
                    session.questions.push(next);
                }
                Some(score)
            }
            SessionMode::RapidFire if answer.is_empty() => {
                let score = self.fallback_score(index, &question, answer);
                session.record_score(score.clone());
                Some(score)
            }
            SessionMode::RapidFire => None,
        };

        if session.is_answered_in_full() {
            if session.mode == SessionMode::RapidFire {
                self.score_pending(session).await;
            }
            session.status = SessionStatus::Completed;
            session.completed_at = Some(Utc::now());
            session.report = build_report(session);
            info!(
                session_id = %session.id,
                average = session.report.as_ref().map(|r| r.average_score),
                "Session completed"
            );
        }
        Ok(score)
    }

    async fn evaluate(&self, index: usize, question: &QuestionRecord, answer: &str) -> ScoreRecord {
        let started = Instant::now();
        let limit = self.inner.config.remote_timeout;

        self.count_remote_call();
        match with_deadline(limit, self.inner.model.evaluate_answer(question, answer)).await {
            Ok(evaluation) => {
                self.inner.stats.record_model_evaluation();
                ScoreRecord {
                    question_index: index,
                    score: evaluation.score.clamp(0.0, MAX_SCORE),
                    source: ScoreSource::Model,
                    latency: started.elapsed(),
                    feedback: evaluation.feedback,
                }
            }
            Err(e) => {
                warn!(
                    model = self.inner.model.name(),
                    error = %e,
                    "Remote evaluation failed; using keyword scoring"
                );
                self.fallback_score(index, question, answer)
            }
        }
    }

    fn fallback_score(&self, index: usize, question: &QuestionRecord, answer: &str) -> ScoreRecord {
        self.inner.stats.record_fallback_evaluation();
        FallbackEvaluator::evaluate(
            index,
            answer,
            &question.expected_keywords,
            self.inner.config.min_answer_length,
        )
    }

    /// Scores every answered-but-unscored question with one batch call, falling back
    /// to keyword scoring for all of them if the call fails or miscounts.
    async fn score_pending(&self, session: &mut Session) {
        let pending: Vec<(usize, QuestionRecord, String)> = session
            .answers
            .iter()
            .filter(|a| session.score_for(a.question_index).is_none())
            .filter_map(|a| {
                session
                    .questions
                    .get(a.question_index)
                    .map(|q| (a.question_index, q.clone(), a.text.clone()))
            })
            .collect();
        if pending.is_empty() {
            return;
        }

        let context = BatchContext {
            role: session.role.clone(),
            description: session.description_text().to_string(),
        };
        let items: Vec<BatchItem> = pending
            .iter()
            .map(|(_, q, answer)| BatchItem {
                question: q.text.clone(),
                answer: answer.clone(),
                expected_keywords: q.expected_keywords.clone(),
            })
            .collect();

        let started = Instant::now();
        let limit = self.inner.config.batch_timeout;
        self.count_remote_call();
        let result = with_deadline(limit, self.inner.model.evaluate_batch(&context, &items))
            .await
            .and_then(|evals| {
                if evals.len() == items.len() {
                    Ok(evals)
                } else {
                    Err(ModelError::CountMismatch {
                        expected: items.len(),
                        got: evals.len(),
                    })
                }
            });

        match result {
            Ok(evaluations) => {
                let latency = started.elapsed();
                for ((index, _, _), evaluation) in pending.iter().zip(evaluations) {
                    self.inner.stats.record_model_evaluation();
                    session.record_score(ScoreRecord {
                        question_index: *index,
                        score: evaluation.score.clamp(0.0, MAX_SCORE),
                        source: ScoreSource::Model,
                        latency,
                        feedback: evaluation.feedback,
                    });
                }
            }
            Err(e) => {
                warn!(
                    model = self.inner.model.name(),
                    pending = pending.len(),
                    error = %e,
                    "Batch evaluation failed; using keyword scoring"
                );
                for (index, question, answer) in &pending {
                    let score = self.fallback_score(*index, question, answer);
                    session.record_score(score);
                }
            }
        }
    }

    /// Next question at the session's current tier: exact cache, semantic cache,
    /// remote generation, then the bank.
    async fn resolve_question(&self, session: &Session) -> EngineResult<QuestionRecord> {
        if let Some((set, provenance)) = self.lookup_set(session).await
            && let Some(template) = set.first_unasked(&session.questions)
        {
            return Ok(QuestionRecord::issue(template, provenance));
        }

        self.inner.stats.record_bank_fallback();
        self.bank_questions(session, 1)
            .first()
            .map(|template| QuestionRecord::issue(template, Provenance::FallbackBank))
            .ok_or_else(|| EngineError::InvalidInput(format!("no questions for role {}", session.role)))
    }

    /// Fills a rapid-fire session's whole set up front, topping up from the bank.
    async fn resolve_question_set(&self, session: &mut Session) -> EngineResult<()> {
        let wanted = session.question_count;

        if let Some((set, provenance)) = self.lookup_set(session).await {
            for template in &set.questions {
                if session.questions.len() >= wanted {
                    break;
                }
                let duplicate = session
                    .questions
                    .iter()
                    .any(|q| q.text.eq_ignore_ascii_case(template.text.trim()));
                if !duplicate {
                    session
                        .questions
                        .push(QuestionRecord::issue(template, provenance));
                }
            }
        }

        let missing = wanted.saturating_sub(session.questions.len());
        if missing > 0 {
            self.inner.stats.record_bank_fallback();
            let extra = self.bank_questions(session, missing);
            session.questions.extend(
                extra
                    .iter()
                    .map(|t| QuestionRecord::issue(t, Provenance::FallbackBank)),
            );
        }

        if session.questions.is_empty() {
            return Err(EngineError::InvalidInput(format!(
                "no questions for role {}",
                session.role
            )));
        }
        session.question_count = session.questions.len();
        Ok(())
    }

    /// First source holding a set with at least one question this session has not
    /// seen yet.
    async fn lookup_set(&self, session: &Session) -> Option<(QuestionSet, Provenance)> {
        let role = session.role.as_str();
        let description = session.description_text();
        let tier = session.difficulty;
        let asked = &session.questions;

        let key = fingerprint(role, description, tier);
        let exact = self.inner.exact.get(&key).await.unwrap_or_else(|e| {
            self.inner.stats.record_storage_failure();
            warn!(tier = %tier, error = %e, "Exact cache read failed; treating as a miss");
            None
        });
        if let Some(entry) = exact
            && entry.payload().first_unasked(asked).is_some()
        {
            self.inner.stats.record_exact_hit();
            debug!(tier = %tier, "Exact cache hit");
            return Some((entry.payload().clone(), Provenance::CachedExact));
        }

        let signature = RoleSignature::from_request(role, description);
        if let Some(hit) = self.inner.semantic.get(&signature, tier)
            && hit.payload().first_unasked(asked).is_some()
        {
            self.inner.stats.record_semantic_hit();
            debug!(tier = %tier, similarity = hit.similarity, "Semantic cache hit");
            return Some((hit.payload().clone(), Provenance::CachedSemantic));
        }

        self.inner.stats.record_cache_miss();
        let limit = self.inner.config.remote_timeout;
        self.count_remote_call();
        let generated = with_deadline(
            limit,
            self.inner
                .model
                .generate_question_set(role, description, tier, session.question_count),
        )
        .await;

        match generated {
            Ok(set) if !set.is_empty() => {
                self.inner.stats.record_remote_generation();
                if let Err(e) = self.inner.exact.put(key, set.clone()).await {
                    self.inner.stats.record_storage_failure();
                    error!(tier = %tier, error = %e, "Exact cache write-through failed");
                }
                if !signature.is_featureless()
                    && let Err(e) = self.inner.semantic.put(signature, tier, set.clone()).await
                {
                    self.inner.stats.record_storage_failure();
                    error!(tier = %tier, error = %e, "Semantic cache write-through failed");
                }
                debug!(tier = %tier, questions = set.len(), "Generated question set");
                set.first_unasked(asked)
                    .is_some()
                    .then_some((set, Provenance::Generated))
            }
            Ok(_) => {
                self.inner.stats.record_remote_failure();
                warn!(model = self.inner.model.name(), "Model returned an empty question set");
                None
            }
            Err(e) => {
                self.inner.stats.record_remote_failure();
                warn!(
                    model = self.inner.model.name(),
                    error = %e,
                    "Question generation failed; falling back to the bank"
                );
                None
            }
        }
    }

    fn count_remote_call(&self) {
        if self.inner.model.is_remote() {
            self.inner.stats.record_remote_call();
        }
    }

    fn bank_questions(&self, session: &Session, count: usize) -> Vec<QuestionTemplate> {
        let seed = hash_to_u64(session.id.as_bytes());
        self.inner.bank.select(
            &session.role,
            session.difficulty,
            count,
            seed,
            &session.questions,
        )
    }

    fn arm_timer(&self, slot: &SessionSlot, session_id: &str, question_index: usize) {
        let limit = self.inner.config.rapid_fire_time_limit;
        let engine = Arc::downgrade(&self.inner);
        let session_id = session_id.to_string();

        let task = tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            let Some(inner) = engine.upgrade() else {
                return;
            };
            let orchestrator = SessionOrchestrator { inner };
            if let Err(e) = orchestrator
                .expire_question(&session_id, question_index)
                .await
            {
                error!(session_id = %session_id, question_index, error = %e, "Timer expiry failed");
            }
        });
        slot.arm(question_index, task.abort_handle());
    }

    /// Re-arms the rapid-fire timer after a locked operation.
    ///
    /// On failure nothing was persisted, so the timer goes back on `pending`.
    fn rearm(&self, slot: &SessionSlot, session: &Session, pending: usize, committed: bool) {
        if session.mode != SessionMode::RapidFire {
            return;
        }
        if !committed {
            self.arm_timer(slot, &session.id, pending);
        } else if !session.status.is_terminal() {
            self.arm_timer(slot, &session.id, session.current_index());
        }
    }

    async fn load(&self, session_id: &str) -> EngineResult<Option<Session>> {
        get_json(self.inner.store.as_ref(), &session_key(session_id))
            .await
            .map_err(|e| {
                error!(session_id = %session_id, error = %e, "Failed to load session");
                EngineError::from(e)
            })
    }

    async fn load_active(&self, session_id: &str) -> EngineResult<Session> {
        let Some(session) = self.load(session_id).await? else {
            self.inner.slots.remove(session_id);
            return Err(EngineError::SessionNotFound(session_id.to_string()));
        };
        if session.status.is_terminal() {
            return Err(EngineError::SessionTerminal {
                id: session.id,
                status: session.status,
            });
        }
        Ok(session)
    }

    /// Writes the session back. Terminal sessions get a retention expiry and lose
    /// their slot.
    async fn persist(&self, session: &Session) -> EngineResult<()> {
        let expires_at = session
            .completed_at
            .filter(|_| session.status.is_terminal())
            .map(|at| expiry_after(at, self.inner.config.session_retention));

        put_json(
            self.inner.store.as_ref(),
            &session_key(&session.id),
            session,
            expires_at,
        )
        .await
        .map_err(|e| {
            error!(session_id = %session.id, error = %e, "Failed to persist session");
            EngineError::from(e)
        })?;

        if session.status.is_terminal() {
            self.inner.slots.remove(&session.id);
        }
        Ok(())
    }

    async fn abandon_idle(&self, session_id: &str) -> EngineResult<bool> {
        let slot = self.inner.slots.get(session_id);
        let _guard = slot.lock().await;

        let Some(mut session) = self.load(session_id).await? else {
            self.inner.slots.remove(session_id);
            return Ok(false);
        };
        let idle_until = expiry_after(session.updated_at, self.inner.config.inactivity_timeout);
        if session.status.is_terminal() || idle_until > Utc::now() {
            return Ok(false);
        }

        slot.cancel_timer();
        mark_abandoned(&mut session);
        self.persist(&session).await?;
        info!(session_id = %session_id, "Abandoned idle session");
        Ok(true)
    }
}

fn mark_abandoned(session: &mut Session) {
    session.status = SessionStatus::Abandoned;
    session.completed_at = Some(Utc::now());
    session.report = build_report(session);
    session.touch();
}

fn session_key(session_id: &str) -> String {
    format!("{}{}", SESSION_PREFIX, session_id)
}

async fn with_deadline<T>(
    limit: std::time::Duration,
    call: impl Future<Output = ModelResult<T>>,
) -> ModelResult<T> {
    timeout(limit, call)
        .await
        .unwrap_or(Err(ModelError::Timeout(limit)))
}
