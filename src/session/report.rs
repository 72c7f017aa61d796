use chrono::Utc;

use super::types::{ScoreSource, Session, SessionReport};
use crate::constants::rating;

/// Rating band for a final average.
pub fn rating_for(average: f32) -> &'static str {
    if average >= rating::HIRE_MIN_AVERAGE {
        rating::HIRE
    } else if average >= rating::CONSIDER_MIN_AVERAGE {
        rating::CONSIDER
    } else {
        rating::TRAIN
    }
}

/// Summarizes the scores recorded so far. `None` when nothing was scored.
pub fn build_report(session: &Session) -> Option<SessionReport> {
    if session.scores.is_empty() {
        return None;
    }

    let scores: Vec<f32> = session.scores.iter().map(|s| s.score).collect();
    let total: f32 = scores.iter().sum();
    let average = ((total / scores.len() as f32) * 10.0).round() / 10.0;
    let best = scores.iter().copied().fold(f32::MIN, f32::max);
    let worst = scores.iter().copied().fold(f32::MAX, f32::min);
    let model_graded = session
        .scores
        .iter()
        .filter(|s| s.source == ScoreSource::Model)
        .count();

    let finished = session.completed_at.unwrap_or_else(Utc::now);

    Some(SessionReport {
        total_questions: scores.len(),
        average_score: average,
        best_score: best,
        worst_score: worst,
        model_graded,
        fallback_graded: scores.len() - model_graded,
        elapsed_secs: (finished - session.created_at).num_seconds().max(0),
        rating: rating_for(average).to_string(),
        scores,
    })
}
