//! Request and response bodies.

use serde::{Deserialize, Serialize};

use crate::session::{
    Difficulty, QuestionCategory, QuestionRecord, ScoreRecord, ScoreSource, Session, SessionMode,
    SessionReport, SessionStatus, SessionUpdate,
};

#[derive(Debug, Clone, Deserialize)]
pub struct StartSessionRequest {
    #[serde(alias = "job_role")]
    pub role: String,
    #[serde(default, alias = "job_description")]
    pub description: Option<String>,
    #[serde(default)]
    pub mode: SessionMode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnswerRequest {
    pub answer: String,
    /// Question the answer was written for; checked against the pending one.
    #[serde(default)]
    pub question_index: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchRequest {
    pub answers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionView {
    pub index: usize,
    pub text: String,
    pub category: QuestionCategory,
    pub difficulty: Difficulty,
}

impl QuestionView {
    fn new(index: usize, question: &QuestionRecord) -> Self {
        Self {
            index,
            text: question.text.clone(),
            category: question.category,
            difficulty: question.difficulty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub answered: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreView {
    pub question_index: usize,
    pub score: f32,
    pub source: ScoreSource,
    pub feedback: String,
}

impl From<&ScoreRecord> for ScoreView {
    fn from(score: &ScoreRecord) -> Self {
        Self {
            question_index: score.question_index,
            score: score.score,
            source: score.source,
            feedback: score.feedback.clone(),
        }
    }
}

/// Client view of a session. Expected keywords stay server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub role: String,
    pub mode: SessionMode,
    pub status: SessionStatus,
    pub difficulty: Difficulty,
    pub progress: Progress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_question: Option<QuestionView>,
    /// Every question up front, rapid-fire only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<QuestionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_score: Option<ScoreView>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scores: Vec<ScoreView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<SessionReport>,
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        let questions = match session.mode {
            SessionMode::RapidFire => session
                .questions
                .iter()
                .enumerate()
                .map(|(i, q)| QuestionView::new(i, q))
                .collect(),
            SessionMode::Standard => Vec::new(),
        };
        let next_question = if session.status.is_terminal() {
            None
        } else {
            session
                .current_question()
                .map(|q| QuestionView::new(session.current_index(), q))
        };

        Self {
            session_id: session.id.clone(),
            role: session.role.clone(),
            mode: session.mode,
            status: session.status,
            difficulty: session.difficulty,
            progress: Progress {
                answered: session.answers.len(),
                total: session.question_count,
            },
            next_question,
            questions,
            last_score: None,
            scores: session.scores.iter().map(ScoreView::from).collect(),
            report: session.report.clone(),
        }
    }
}

impl From<&SessionUpdate> for SessionResponse {
    fn from(update: &SessionUpdate) -> Self {
        let mut response = SessionResponse::from(&update.session);
        response.last_score = update.score.as_ref().map(ScoreView::from);
        response
    }
}
