use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::bank::QuestionBank;
use crate::cache::CacheStatus;
use crate::difficulty::DifficultyController;
use crate::model::{Evaluation, ModelError, ScriptedModel};
use crate::constants::keys::EXACT_PREFIX;
use crate::model::OfflineModel;
use crate::storage::{FaultyKvStore, KvStore, MemoryKvStore, StorageError};

const ROLE: &str = "Backend Developer";
const DESC: &str = "Build REST APIs with PostgreSQL and Redis.";

fn template(text: &str, difficulty: Difficulty) -> QuestionTemplate {
    QuestionTemplate {
        text: text.to_string(),
        category: QuestionCategory::Technical,
        difficulty,
        rationale: None,
        expected_keywords: vec!["index".to_string(), "transaction".to_string()],
    }
}

fn generated_set(prefix: &str, n: usize) -> QuestionSet {
    QuestionSet::new(
        (0..n)
            .map(|i| template(&format!("{} question {}", prefix, i), Difficulty::Medium))
            .collect(),
    )
}

fn evaluations(scores: &[f32]) -> Vec<Evaluation> {
    scores
        .iter()
        .map(|s| Evaluation {
            score: *s,
            feedback: "ok".to_string(),
        })
        .collect()
}

fn test_config() -> EngineConfig {
    EngineConfig::default()
        .with_standard_questions(3)
        .with_rapid_fire_questions(3)
}

fn engine_on(
    store: Arc<dyn KvStore>,
    model: &Arc<ScriptedModel>,
    config: EngineConfig,
) -> SessionOrchestrator {
    SessionOrchestrator::new(
        config,
        store,
        QuestionBank::builtin().unwrap(),
        Arc::clone(model) as Arc<dyn crate::model::QuestionModel>,
    )
}

fn engine(model: &Arc<ScriptedModel>, config: EngineConfig) -> SessionOrchestrator {
    engine_on(Arc::new(MemoryKvStore::new()), model, config)
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_start_rejects_empty_role() {
    let model = Arc::new(ScriptedModel::new());
    let engine = engine(&model, test_config());

    let err = engine
        .start_session("   ", Some(DESC), SessionMode::Standard)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[tokio::test]
async fn test_start_generates_and_backfills_both_tiers() {
    let model = Arc::new(ScriptedModel::new());
    model.push_generation(Ok(generated_set("gen", 3)));
    let engine = engine(&model, test_config());

    let update = engine
        .start_session(ROLE, Some(DESC), SessionMode::Standard)
        .await
        .unwrap();

    assert_eq!(update.resolution, Some(CacheStatus::MissGenerated));
    assert_eq!(update.session.status, SessionStatus::InProgress);
    assert_eq!(update.session.difficulty, Difficulty::Medium);
    assert_eq!(update.session.questions.len(), 1);
    assert_eq!(update.session.questions[0].provenance, Provenance::Generated);
    assert_eq!(update.session.questions[0].text, "gen question 0");

    engine.exact_cache().run_pending_tasks();
    assert_eq!(engine.exact_cache().len(), 1);
    assert_eq!(engine.semantic_cache().tier_len(Difficulty::Medium), 1);
}

#[tokio::test]
async fn test_exact_reuse_on_identical_description() {
    let model = Arc::new(ScriptedModel::new());
    model.push_generation(Ok(generated_set("gen", 3)));
    let engine = engine(&model, test_config());

    let first = engine
        .start_session(ROLE, Some(DESC), SessionMode::Standard)
        .await
        .unwrap();
    let second = engine
        .start_session(ROLE, Some(DESC), SessionMode::Standard)
        .await
        .unwrap();
    let variant = engine
        .start_session(
            "  backend   DEVELOPER ",
            Some("build rest APIs with\npostgresql and redis."),
            SessionMode::Standard,
        )
        .await
        .unwrap();

    assert_eq!(first.resolution, Some(CacheStatus::MissGenerated));
    assert_eq!(second.resolution, Some(CacheStatus::HitExact));
    assert_eq!(variant.resolution, Some(CacheStatus::HitExact));
    assert_eq!(second.session.questions[0].text, first.session.questions[0].text);
    assert_eq!(model.generate_calls(), 1);

    let stats = engine.stats();
    assert_eq!(stats.exact_hits, 2);
    assert_eq!(stats.remote_generations, 1);
    assert_eq!(stats.api_calls_saved, 2);
}

#[tokio::test]
async fn test_semantic_reuse_for_similar_role() {
    let model = Arc::new(ScriptedModel::new());
    model.push_generation(Ok(generated_set("gen", 3)));
    let engine = engine(&model, test_config());

    engine
        .start_session(
            "Senior Backend Developer",
            Some("Build REST APIs with PostgreSQL"),
            SessionMode::Standard,
        )
        .await
        .unwrap();
    let similar = engine
        .start_session(
            "Lead Backend Engineer",
            Some("Design REST services on PostgreSQL"),
            SessionMode::Standard,
        )
        .await
        .unwrap();

    assert_eq!(similar.resolution, Some(CacheStatus::HitSemantic));
    assert_eq!(
        similar.session.questions[0].provenance,
        Provenance::CachedSemantic
    );
    assert_eq!(model.generate_calls(), 1);
    assert_eq!(engine.stats().semantic_hits, 1);
}

#[tokio::test]
async fn test_dissimilar_role_misses_semantic_tier() {
    let model = Arc::new(ScriptedModel::new());
    model.push_generation(Ok(generated_set("gen", 3)));
    let engine = engine(&model, test_config());

    engine
        .start_session("Senior Backend Developer", Some("REST APIs"), SessionMode::Standard)
        .await
        .unwrap();
    let other = engine
        .start_session(
            "Junior Frontend Developer",
            Some("HTML, CSS and accessibility"),
            SessionMode::Standard,
        )
        .await
        .unwrap();

    assert_eq!(other.resolution, Some(CacheStatus::MissFallback));
    assert_eq!(other.session.questions[0].provenance, Provenance::FallbackBank);
    assert_eq!(model.generate_calls(), 2);
}

#[tokio::test]
async fn test_offline_start_uses_bank() {
    let model = Arc::new(ScriptedModel::new());
    let engine = engine(&model, test_config());

    let update = engine
        .start_session("Data Analyst", None, SessionMode::Standard)
        .await
        .unwrap();

    assert_eq!(update.resolution, Some(CacheStatus::MissFallback));
    assert!(!update.session.questions[0].text.is_empty());
    assert_eq!(update.session.questions[0].provenance, Provenance::FallbackBank);

    let stats = engine.stats();
    assert_eq!(stats.remote_failures, 1);
    assert_eq!(stats.bank_fallbacks, 1);
}

#[tokio::test]
async fn test_offline_follow_up_comes_from_bank() {
    let model = Arc::new(ScriptedModel::new());
    let engine = engine(&model, test_config());
    let id = engine
        .start_session("Data Analyst", None, SessionMode::Standard)
        .await
        .unwrap()
        .session
        .id;

    let update = engine.submit_answer(&id, "a first answer").await.unwrap();

    let session = update.session;
    assert_eq!(session.questions.len(), 2);
    assert_eq!(session.questions[1].provenance, Provenance::FallbackBank);
    assert_ne!(
        session.questions[1].text.to_lowercase(),
        session.questions[0].text.to_lowercase()
    );
    assert_eq!(update.resolution, Some(CacheStatus::MissFallback));
    assert_eq!(engine.stats().bank_fallbacks, 2);
}

#[tokio::test(start_paused = true)]
async fn test_slow_generation_times_out_to_bank() {
    let model = Arc::new(ScriptedModel::new());
    model.push_generation(Ok(generated_set("late", 3)));
    model.set_delay(Some(Duration::from_secs(30)));
    let engine = engine(
        &model,
        test_config().with_remote_timeout(Duration::from_secs(20)),
    );

    let update = engine
        .start_session(ROLE, Some(DESC), SessionMode::Standard)
        .await
        .unwrap();

    assert_eq!(update.resolution, Some(CacheStatus::MissFallback));
    engine.exact_cache().run_pending_tasks();
    assert!(engine.exact_cache().is_empty());
}

#[tokio::test]
async fn test_evaluation_failure_degrades_to_fallback() {
    let model = Arc::new(ScriptedModel::new());
    model.push_evaluation(Err(ModelError::Unavailable("down".into())));
    let engine = engine(&model, test_config());

    let started = engine
        .start_session(ROLE, Some(DESC), SessionMode::Standard)
        .await
        .unwrap();
    let update = engine
        .submit_answer(
            &started.session.id,
            "I would add an index and wrap the writes in a transaction.",
        )
        .await
        .unwrap();

    let score = update.score.unwrap();
    assert_eq!(score.source, ScoreSource::Fallback);
    assert_eq!(score.latency, Duration::ZERO);
    assert_eq!(score.question_index, 0);
    assert_eq!(update.session.scores.len(), 1);
    assert_eq!(engine.stats().fallback_evaluations, 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_evaluation_times_out_to_fallback() {
    let model = Arc::new(ScriptedModel::new());
    let engine = engine(&model, test_config());
    let started = engine
        .start_session(ROLE, Some(DESC), SessionMode::Standard)
        .await
        .unwrap();

    model.push_score(9.0);
    model.set_delay(Some(Duration::from_secs(25)));
    let update = engine
        .submit_answer(&started.session.id, "A detailed answer about indexes.")
        .await
        .unwrap();

    assert_eq!(update.score.unwrap().source, ScoreSource::Fallback);
}

#[tokio::test]
async fn test_model_scores_drive_tier_and_completion() {
    let model = Arc::new(ScriptedModel::new());
    model.push_score(9.0).push_score(9.0).push_score(8.0);
    let engine = engine(&model, test_config());

    let started = engine
        .start_session(ROLE, Some(DESC), SessionMode::Standard)
        .await
        .unwrap();
    let id = started.session.id.clone();

    let first = engine.submit_answer(&id, "first answer text").await.unwrap();
    assert_eq!(first.session.difficulty, Difficulty::Hard);
    assert_eq!(first.score.as_ref().unwrap().source, ScoreSource::Model);
    assert!(first.resolution.is_some());

    engine.submit_answer(&id, "second answer text").await.unwrap();
    let last = engine.submit_answer(&id, "third answer text").await.unwrap();

    let session = last.session;
    assert_eq!(session.status, SessionStatus::Completed);
    assert!(session.completed_at.is_some());
    assert_eq!(session.difficulty, Difficulty::Hard);
    assert_eq!(last.resolution, None);

    let report = session.report.unwrap();
    assert_eq!(report.total_questions, 3);
    assert_eq!(report.best_score, 9.0);
    assert_eq!(report.worst_score, 8.0);
    assert_eq!(report.model_graded, 3);
    assert_eq!(report.rating, "HIRE");
}

#[tokio::test]
async fn test_low_scores_drop_to_easy_and_tiers_replay() {
    let model = Arc::new(ScriptedModel::new());
    model.push_score(3.0).push_score(4.0).push_score(5.0);
    let engine = engine(&model, test_config().with_standard_questions(4));

    let id = engine
        .start_session(ROLE, None, SessionMode::Standard)
        .await
        .unwrap()
        .session
        .id;
    for answer in ["one answer", "two answer", "three answer"] {
        engine.submit_answer(&id, answer).await.unwrap();
    }

    let session = engine.get_session(&id).await.unwrap();
    assert_eq!(session.difficulty, Difficulty::Easy);

    let replayed = DifficultyController::new(3).replay(&session.scores);
    assert_eq!(replayed.last(), Some(&session.difficulty));
}

#[tokio::test]
async fn test_same_tier_reuses_cached_set() {
    let model = Arc::new(ScriptedModel::new());
    model.push_generation(Ok(generated_set("gen", 3)));
    model.push_score(7.0);
    let engine = engine(&model, test_config());

    let id = engine
        .start_session(ROLE, Some(DESC), SessionMode::Standard)
        .await
        .unwrap()
        .session
        .id;
    let update = engine.submit_answer(&id, "a medium answer").await.unwrap();

    assert_eq!(update.session.difficulty, Difficulty::Medium);
    assert_eq!(update.resolution, Some(CacheStatus::HitExact));
    assert_eq!(update.session.questions[1].text, "gen question 1");
    assert_eq!(model.generate_calls(), 1);
}

#[tokio::test]
async fn test_questions_are_never_repeated() {
    let model = Arc::new(ScriptedModel::new());
    let engine = engine(&model, test_config().with_standard_questions(6));

    let id = engine
        .start_session("Python Developer", None, SessionMode::Standard)
        .await
        .unwrap()
        .session
        .id;
    for i in 0..6 {
        engine
            .submit_answer(&id, &format!("answer number {}", i))
            .await
            .unwrap();
    }

    let session = engine.get_session(&id).await.unwrap();
    let texts: HashSet<_> = session.questions.iter().map(|q| q.text.to_lowercase()).collect();
    assert_eq!(texts.len(), session.questions.len());
    assert_eq!(session.status, SessionStatus::Completed);
}

#[tokio::test]
async fn test_submit_validation_errors() {
    let model = Arc::new(ScriptedModel::new());
    let engine = engine(&model, test_config().with_standard_questions(1));

    let err = engine.submit_answer("missing", "answer").await.unwrap_err();
    assert!(matches!(err, EngineError::SessionNotFound(_)));

    let id = engine
        .start_session(ROLE, None, SessionMode::Standard)
        .await
        .unwrap()
        .session
        .id;

    let err = engine.submit_answer(&id, "   ").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));

    let err = engine
        .submit_batch(&id, &["a".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));

    engine.submit_answer(&id, "the only answer").await.unwrap();
    let err = engine.submit_answer(&id, "too late").await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::SessionTerminal {
            status: SessionStatus::Completed,
            ..
        }
    ));
}

#[tokio::test]
async fn test_concurrent_answers_are_serialized() {
    let model = Arc::new(ScriptedModel::new());
    let engine = engine(&model, test_config().with_standard_questions(4));
    let id = engine
        .start_session(ROLE, None, SessionMode::Standard)
        .await
        .unwrap()
        .session
        .id;

    let handles: Vec<_> = (0..3)
        .map(|i| {
            let engine = engine.clone();
            let id = id.clone();
            tokio::spawn(async move {
                engine
                    .submit_answer(&id, &format!("concurrent answer {}", i))
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let session = engine.get_session(&id).await.unwrap();
    assert_eq!(session.answers.len(), 3);
    let indices: Vec<_> = session.scores.iter().map(|s| s.question_index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(session.questions.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_rapid_fire_timer_expiry_submits_empty_answer() {
    let model = Arc::new(ScriptedModel::new());
    let engine = engine(&model, test_config());

    let started = engine
        .start_session(ROLE, None, SessionMode::RapidFire)
        .await
        .unwrap();
    let id = started.session.id.clone();
    assert_eq!(started.session.questions.len(), 3);
    assert_eq!(engine.armed_timer(&id), Some(0));

    tokio::time::sleep(Duration::from_secs(61)).await;
    settle().await;

    let session = engine.get_session(&id).await.unwrap();
    assert_eq!(session.answers.len(), 1);
    assert!(session.answers[0].timed_out);
    assert_eq!(session.answers[0].text, "");
    let score = session.score_for(0).unwrap();
    assert_eq!(score.score, 0.0);
    assert_eq!(score.source, ScoreSource::Fallback);
    assert_eq!(engine.armed_timer(&id), Some(1));
    assert_eq!(engine.stats().question_timeouts, 1);
}

#[tokio::test(start_paused = true)]
async fn test_manual_answer_cancels_pending_timer() {
    let model = Arc::new(ScriptedModel::new());
    let engine = engine(&model, test_config());
    let id = engine
        .start_session(ROLE, None, SessionMode::RapidFire)
        .await
        .unwrap()
        .session
        .id;

    tokio::time::sleep(Duration::from_secs(30)).await;
    let update = engine.submit_answer(&id, "quick answer").await.unwrap();
    assert!(update.score.is_none());
    assert_eq!(engine.armed_timer(&id), Some(1));

    // Question 0's original deadline passes without effect.
    tokio::time::sleep(Duration::from_secs(40)).await;
    settle().await;
    let session = engine.get_session(&id).await.unwrap();
    assert_eq!(session.answers.len(), 1);
    assert!(!session.answers[0].timed_out);

    // Question 1's own deadline (t = 90s) does expire it.
    tokio::time::sleep(Duration::from_secs(25)).await;
    settle().await;
    let session = engine.get_session(&id).await.unwrap();
    assert_eq!(session.answers.len(), 2);
    assert!(session.answers[1].timed_out);
}

#[tokio::test(start_paused = true)]
async fn test_stale_expiry_is_ignored() {
    let model = Arc::new(ScriptedModel::new());
    let engine = engine(&model, test_config());
    let id = engine
        .start_session(ROLE, None, SessionMode::RapidFire)
        .await
        .unwrap()
        .session
        .id;

    engine.submit_answer(&id, "answered in time").await.unwrap();

    assert!(!engine.expire_question(&id, 0).await.unwrap());
    assert!(!engine.expire_question("missing", 0).await.unwrap());
    let session = engine.get_session(&id).await.unwrap();
    assert_eq!(session.answers.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_expiry_and_manual_answer_race_has_one_winner() {
    let model = Arc::new(ScriptedModel::new());
    let engine = engine(&model, test_config());
    let id = engine
        .start_session(ROLE, None, SessionMode::RapidFire)
        .await
        .unwrap()
        .session
        .id;

    tokio::time::sleep(Duration::from_secs(60)).await;
    let manual = engine
        .submit_answer_at(&id, Some(0), "right at the buzzer")
        .await;
    settle().await;

    let session = engine.get_session(&id).await.unwrap();
    let indices: Vec<_> = session.answers.iter().map(|a| a.question_index).collect();
    let unique: HashSet<_> = indices.iter().collect();
    assert_eq!(unique.len(), indices.len());
    assert_eq!(indices, (0..indices.len()).collect::<Vec<_>>());

    let first: Vec<_> = session
        .answers
        .iter()
        .filter(|a| a.question_index == 0)
        .collect();
    assert_eq!(first.len(), 1);
    match manual {
        Ok(_) => {
            assert!(!first[0].timed_out);
            assert_eq!(first[0].text, "right at the buzzer");
        }
        Err(err) => {
            assert!(matches!(
                err,
                EngineError::QuestionClosed {
                    question_index: 0,
                    pending: 1
                }
            ));
            assert!(first[0].timed_out);
            assert_eq!(first[0].text, "");
        }
    }
    assert!(
        session
            .answers
            .iter()
            .all(|a| a.text != "right at the buzzer" || a.question_index == 0)
    );
}

#[tokio::test(start_paused = true)]
async fn test_late_answer_for_expired_question_is_rejected() {
    let model = Arc::new(ScriptedModel::new());
    let engine = engine(&model, test_config());
    let id = engine
        .start_session(ROLE, None, SessionMode::RapidFire)
        .await
        .unwrap()
        .session
        .id;

    assert!(engine.expire_question(&id, 0).await.unwrap());
    let err = engine
        .submit_answer_at(&id, Some(0), "too late")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::QuestionClosed {
            question_index: 0,
            pending: 1
        }
    ));

    let session = engine.get_session(&id).await.unwrap();
    let answers: Vec<_> = session
        .answers
        .iter()
        .map(|a| (a.question_index, a.text.as_str(), a.timed_out))
        .collect();
    assert_eq!(answers, vec![(0, "", true)]);
    assert_eq!(engine.armed_timer(&id), Some(1));

    engine
        .submit_answer_at(&id, Some(1), "on time")
        .await
        .unwrap();
    let session = engine.get_session(&id).await.unwrap();
    assert_eq!(session.answers[1].question_index, 1);
    assert_eq!(session.answers[1].text, "on time");
}

#[tokio::test(start_paused = true)]
async fn test_rapid_fire_last_timeout_completes_session() {
    let model = Arc::new(ScriptedModel::new());
    let engine = engine(&model, test_config().with_rapid_fire_questions(2));
    let id = engine
        .start_session(ROLE, None, SessionMode::RapidFire)
        .await
        .unwrap()
        .session
        .id;

    tokio::time::sleep(Duration::from_secs(121)).await;
    settle().await;

    let session = engine.get_session(&id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.scores.len(), 2);
    assert!(session.scores.iter().all(|s| s.score == 0.0));
    assert_eq!(model.batch_calls(), 0);
    assert_eq!(session.report.unwrap().rating, "TRAIN");
}

#[tokio::test]
async fn test_batch_scores_with_one_model_call() {
    let model = Arc::new(ScriptedModel::new());
    model.push_batch(Ok(evaluations(&[8.0, 7.0, 9.0])));
    let engine = engine(&model, test_config());
    let id = engine
        .start_session(ROLE, None, SessionMode::RapidFire)
        .await
        .unwrap()
        .session
        .id;

    let answers: Vec<String> = ["alpha answer", "beta answer", "gamma answer"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let update = engine.submit_batch(&id, &answers).await.unwrap();

    let session = update.session;
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(model.batch_calls(), 1);
    assert_eq!(model.evaluate_calls(), 0);
    assert!(session.scores.iter().all(|s| s.source == ScoreSource::Model));
    let scores: Vec<f32> = session.scores.iter().map(|s| s.score).collect();
    assert_eq!(scores, vec![8.0, 7.0, 9.0]);
    assert_eq!(session.report.unwrap().average_score, 8.0);
    assert_eq!(engine.armed_timer(&id), None);
}

#[tokio::test]
async fn test_batch_count_mismatch_falls_back_for_every_answer() {
    let model = Arc::new(ScriptedModel::new());
    model.push_batch(Ok(evaluations(&[8.0, 7.0])));
    let engine = engine(&model, test_config());
    let id = engine
        .start_session(ROLE, None, SessionMode::RapidFire)
        .await
        .unwrap()
        .session
        .id;

    let answers = vec!["one".to_string(), "two".to_string(), "three".to_string()];
    let session = engine.submit_batch(&id, &answers).await.unwrap().session;

    assert_eq!(session.scores.len(), 3);
    assert!(session.scores.iter().all(|s| s.source == ScoreSource::Fallback));
    assert_eq!(session.report.unwrap().fallback_graded, 3);
}

#[tokio::test]
async fn test_batch_failure_keeps_every_answer() {
    let model = Arc::new(ScriptedModel::new());
    let engine = engine(&model, test_config());
    let id = engine
        .start_session(ROLE, None, SessionMode::RapidFire)
        .await
        .unwrap()
        .session
        .id;

    engine.submit_answer(&id, "first on its own").await.unwrap();
    let rest = vec!["second".to_string(), "third".to_string()];
    let session = engine.submit_batch(&id, &rest).await.unwrap().session;

    assert_eq!(session.answers.len(), 3);
    assert_eq!(session.scores.len(), 3);
    assert!(session.scores.iter().all(|s| s.source == ScoreSource::Fallback));
}

#[tokio::test(start_paused = true)]
async fn test_batch_skips_already_scored_timeouts() {
    let model = Arc::new(ScriptedModel::new());
    model.push_batch(Ok(evaluations(&[6.0, 7.0])));
    let engine = engine(&model, test_config());
    let id = engine
        .start_session(ROLE, None, SessionMode::RapidFire)
        .await
        .unwrap()
        .session
        .id;

    tokio::time::sleep(Duration::from_secs(61)).await;
    settle().await;

    let rest = vec!["second".to_string(), "third".to_string()];
    let session = engine.submit_batch(&id, &rest).await.unwrap().session;

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.score_for(0).unwrap().source, ScoreSource::Fallback);
    assert_eq!(session.score_for(1).unwrap().score, 6.0);
    assert_eq!(session.score_for(2).unwrap().score, 7.0);
}

#[tokio::test]
async fn test_batch_rejects_too_many_answers() {
    let model = Arc::new(ScriptedModel::new());
    let engine = engine(&model, test_config());
    let id = engine
        .start_session(ROLE, None, SessionMode::RapidFire)
        .await
        .unwrap()
        .session
        .id;

    let answers: Vec<String> = (0..4).map(|i| format!("answer {}", i)).collect();
    let err = engine.submit_batch(&id, &answers).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));

    let err = engine.submit_batch(&id, &[]).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));

    let session = engine.get_session(&id).await.unwrap();
    assert!(session.answers.is_empty());
    assert_eq!(engine.armed_timer(&id), Some(0));
}

#[tokio::test]
async fn test_abandon_session() {
    let model = Arc::new(ScriptedModel::new());
    model.push_score(7.0);
    let engine = engine(&model, test_config());
    let id = engine
        .start_session(ROLE, None, SessionMode::Standard)
        .await
        .unwrap()
        .session
        .id;
    engine.submit_answer(&id, "one answer in").await.unwrap();

    let session = engine.abandon_session(&id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Abandoned);
    assert_eq!(session.report.as_ref().unwrap().total_questions, 1);
    assert_eq!(session.report.unwrap().rating, "CONSIDER");

    let err = engine.abandon_session(&id).await.unwrap_err();
    assert!(matches!(err, EngineError::SessionTerminal { .. }));
    let err = engine.abandon_session("missing").await.unwrap_err();
    assert!(matches!(err, EngineError::SessionNotFound(_)));
}

#[tokio::test(start_paused = true)]
async fn test_abandon_cancels_rapid_fire_timer() {
    let model = Arc::new(ScriptedModel::new());
    let engine = engine(&model, test_config());
    let id = engine
        .start_session(ROLE, None, SessionMode::RapidFire)
        .await
        .unwrap()
        .session
        .id;

    let session = engine.abandon_session(&id).await.unwrap();
    assert!(session.report.is_none());
    assert_eq!(engine.armed_timer(&id), None);

    tokio::time::sleep(Duration::from_secs(120)).await;
    settle().await;
    let session = engine.get_session(&id).await.unwrap();
    assert!(session.answers.is_empty());
}

#[tokio::test]
async fn test_reap_abandons_idle_then_deletes_after_retention() {
    let model = Arc::new(ScriptedModel::new());
    let engine = engine(
        &model,
        test_config()
            .with_inactivity_timeout(Duration::ZERO)
            .with_session_retention(Duration::ZERO),
    );
    let id = engine
        .start_session(ROLE, None, SessionMode::Standard)
        .await
        .unwrap()
        .session
        .id;

    let first = engine.reap().await.unwrap();
    assert_eq!(first.abandoned, 1);
    assert_eq!(first.deleted, 0);

    let second = engine.reap().await.unwrap();
    assert_eq!(second.deleted, 1);

    let err = engine.get_session(&id).await.unwrap_err();
    assert!(matches!(err, EngineError::SessionNotFound(_)));
}

#[tokio::test]
async fn test_reap_leaves_active_sessions_alone() {
    let model = Arc::new(ScriptedModel::new());
    let engine = engine(&model, test_config());
    let id = engine
        .start_session(ROLE, None, SessionMode::Standard)
        .await
        .unwrap()
        .session
        .id;

    let summary = engine.reap().await.unwrap();
    assert_eq!(summary, ReapSummary::default());
    assert_eq!(
        engine.get_session(&id).await.unwrap().status,
        SessionStatus::InProgress
    );
}

#[tokio::test]
async fn test_sessions_and_caches_survive_restart_on_shared_store() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let model = Arc::new(ScriptedModel::new());
    model.push_generation(Ok(generated_set("gen", 3)));

    let before = engine_on(Arc::clone(&store), &model, test_config());
    let id = before
        .start_session(
            "Senior Backend Developer",
            Some("Build REST APIs with PostgreSQL"),
            SessionMode::Standard,
        )
        .await
        .unwrap()
        .session
        .id;
    drop(before);

    let after = engine_on(Arc::clone(&store), &model, test_config());
    assert_eq!(after.hydrate().await.unwrap(), 1);

    let session = after.get_session(&id).await.unwrap();
    assert_eq!(session.questions.len(), 1);

    let exact = after
        .start_session(
            "Senior Backend Developer",
            Some("Build REST APIs with PostgreSQL"),
            SessionMode::Standard,
        )
        .await
        .unwrap();
    assert_eq!(exact.resolution, Some(CacheStatus::HitExact));

    let semantic = after
        .start_session(
            "Lead Backend Engineer",
            Some("Design REST services on PostgreSQL"),
            SessionMode::Standard,
        )
        .await
        .unwrap();
    assert_eq!(semantic.resolution, Some(CacheStatus::HitSemantic));
    assert_eq!(model.generate_calls(), 1);

    let update = after.submit_answer(&id, "still answerable").await.unwrap();
    assert_eq!(update.session.answers.len(), 1);
}

#[test]
fn test_engine_config_validation() {
    assert!(EngineConfig::default().validate().is_ok());
    assert!(
        EngineConfig::default()
            .with_semantic_threshold(0.0)
            .validate()
            .is_err()
    );
    assert!(
        EngineConfig::default()
            .with_semantic_threshold(1.0)
            .validate()
            .is_ok()
    );
    assert!(
        EngineConfig::default()
            .with_difficulty_window(0)
            .validate()
            .is_err()
    );
    assert!(
        EngineConfig::default()
            .with_rapid_fire_time_limit(Duration::ZERO)
            .validate()
            .is_err()
    );
}

#[test]
fn test_rating_bands() {
    assert_eq!(rating_for(8.0), "HIRE");
    assert_eq!(rating_for(7.9), "CONSIDER");
    assert_eq!(rating_for(6.0), "CONSIDER");
    assert_eq!(rating_for(5.9), "TRAIN");
}

#[test]
fn test_stats_hit_rate() {
    let stats = EngineStats::default();
    assert_eq!(stats.snapshot().hit_rate, 0.0);
    assert_eq!(stats.snapshot().cache_efficiency, CacheEfficiency::NoData);

    stats.record_exact_hit();
    stats.record_semantic_hit();
    stats.record_cache_miss();
    stats.record_cache_miss();

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.api_calls_saved, 2);
    assert!((snapshot.hit_rate - 0.5).abs() < f64::EPSILON);
    assert_eq!(snapshot.cache_efficiency, CacheEfficiency::Fair);
}

#[test]
fn test_cache_efficiency_bands() {
    assert_eq!(CacheEfficiency::from_hit_rate(10, 0.8), CacheEfficiency::Excellent);
    assert_eq!(CacheEfficiency::from_hit_rate(10, 0.6), CacheEfficiency::Good);
    assert_eq!(CacheEfficiency::from_hit_rate(10, 0.4), CacheEfficiency::Fair);
    assert_eq!(CacheEfficiency::from_hit_rate(10, 0.39), CacheEfficiency::WarmingUp);
    assert_eq!(CacheEfficiency::from_hit_rate(0, 0.0), CacheEfficiency::NoData);
}

#[tokio::test]
async fn test_stats_count_remote_calls_and_entries() {
    let model = Arc::new(ScriptedModel::new());
    model.push_generation(Ok(generated_set("gen", 3)));
    model.push_score(6.0);
    let engine = engine(&model, test_config());

    let id = engine
        .start_session(ROLE, Some(DESC), SessionMode::Standard)
        .await
        .unwrap()
        .session
        .id;
    engine.submit_answer(&id, "use a covering index").await.unwrap();

    let stats = engine.stats();
    assert_eq!(stats.remote_calls, 2);
    assert_eq!(stats.remote_generations, 1);
    assert_eq!(stats.model_evaluations, 1);
    assert_eq!(stats.exact_entries, 1);
    assert_eq!(stats.semantic_entries, 1);
    assert_eq!(stats.storage_failures, 0);
}

#[tokio::test]
async fn test_offline_model_makes_no_remote_calls() {
    let engine = SessionOrchestrator::new(
        test_config(),
        Arc::new(MemoryKvStore::new()),
        QuestionBank::builtin().unwrap(),
        Arc::new(OfflineModel),
    );
    let id = engine
        .start_session("Data Analyst", None, SessionMode::Standard)
        .await
        .unwrap()
        .session
        .id;
    engine.submit_answer(&id, "group by region").await.unwrap();

    let stats = engine.stats();
    assert_eq!(stats.remote_calls, 0);
    assert_eq!(stats.remote_failures, 2);
    assert_eq!(stats.fallback_evaluations, 1);
}

#[tokio::test(start_paused = true)]
async fn test_reaper_runs_on_interval_and_stops() {
    let model = Arc::new(ScriptedModel::new());
    let engine = engine(
        &model,
        test_config().with_inactivity_timeout(Duration::ZERO),
    );
    let id = engine
        .start_session(ROLE, None, SessionMode::Standard)
        .await
        .unwrap()
        .session
        .id;

    let reaper = Reaper::with_interval(engine.clone(), Duration::from_secs(10));
    let handle = reaper.start();
    assert!(reaper.is_running());

    tokio::time::sleep(Duration::from_secs(11)).await;
    settle().await;
    assert_eq!(
        engine.get_session(&id).await.unwrap().status,
        SessionStatus::Abandoned
    );

    reaper.shutdown();
    tokio::time::sleep(Duration::from_secs(11)).await;
    handle.await.unwrap();
    assert!(!reaper.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_start_persist_failure_surfaces_and_leaves_nothing_behind() {
    let store = Arc::new(FaultyKvStore::broken());
    let model = Arc::new(ScriptedModel::new());
    let engine = engine_on(
        Arc::clone(&store) as Arc<dyn KvStore>,
        &model,
        test_config(),
    );

    let err = engine
        .start_session(ROLE, None, SessionMode::RapidFire)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Storage(StorageError::WriteFailed { .. })
    ));
    assert_eq!(engine.open_slots(), 0);

    // No timer was left behind to write an expiry later.
    store.fail_writes(false);
    tokio::time::sleep(Duration::from_secs(61)).await;
    settle().await;
    assert!(store.is_empty());
    assert_eq!(engine.stats().question_timeouts, 0);
}

#[tokio::test(start_paused = true)]
async fn test_answer_persist_failure_keeps_session_and_rearms_timer() {
    let store = Arc::new(FaultyKvStore::new());
    let model = Arc::new(ScriptedModel::new());
    let engine = engine_on(
        Arc::clone(&store) as Arc<dyn KvStore>,
        &model,
        test_config(),
    );
    let id = engine
        .start_session(ROLE, None, SessionMode::RapidFire)
        .await
        .unwrap()
        .session
        .id;
    assert_eq!(engine.armed_timer(&id), Some(0));

    store.fail_writes(true);
    let err = engine.submit_answer(&id, "lost answer").await.unwrap_err();
    assert!(matches!(err, EngineError::Storage(_)));

    let session = engine.get_session(&id).await.unwrap();
    assert!(session.answers.is_empty());
    assert_eq!(session.current_index(), 0);
    assert_eq!(engine.armed_timer(&id), Some(0));

    // The re-armed timer still closes question 0 once the store recovers.
    store.fail_writes(false);
    tokio::time::sleep(Duration::from_secs(61)).await;
    settle().await;
    let session = engine.get_session(&id).await.unwrap();
    assert_eq!(session.answers.len(), 1);
    assert_eq!(session.answers[0].question_index, 0);
    assert!(session.answers[0].timed_out);
}

#[tokio::test]
async fn test_standard_answer_persist_failure_changes_nothing() {
    let store = Arc::new(FaultyKvStore::new());
    let model = Arc::new(ScriptedModel::new());
    let engine = engine_on(
        Arc::clone(&store) as Arc<dyn KvStore>,
        &model,
        test_config(),
    );
    let id = engine
        .start_session(ROLE, None, SessionMode::Standard)
        .await
        .unwrap()
        .session
        .id;

    store.fail_writes(true);
    let err = engine.submit_answer(&id, "an answer").await.unwrap_err();
    assert!(matches!(err, EngineError::Storage(_)));

    let session = engine.get_session(&id).await.unwrap();
    assert!(session.answers.is_empty());
    assert!(session.scores.is_empty());
    assert_eq!(session.questions.len(), 1);
}

#[tokio::test]
async fn test_cache_store_failures_degrade_to_miss_and_are_counted() {
    let store = Arc::new(FaultyKvStore::broken().only_under(EXACT_PREFIX));
    let model = Arc::new(ScriptedModel::new());
    model.push_generation(Ok(generated_set("gen", 3)));
    let engine = engine_on(
        Arc::clone(&store) as Arc<dyn KvStore>,
        &model,
        test_config(),
    );

    let first = engine
        .start_session(ROLE, Some(DESC), SessionMode::Standard)
        .await
        .unwrap();
    assert_eq!(first.resolution, Some(CacheStatus::MissGenerated));
    // One failed read-through, one failed write-through.
    assert_eq!(engine.stats().storage_failures, 2);
    assert!(engine.get_session(&first.session.id).await.is_ok());

    // The in-memory exact tier still serves the set.
    let second = engine
        .start_session(ROLE, Some(DESC), SessionMode::Standard)
        .await
        .unwrap();
    assert_eq!(second.resolution, Some(CacheStatus::HitExact));
    assert_eq!(model.generate_calls(), 1);
    assert_eq!(engine.stats().storage_failures, 2);
}
