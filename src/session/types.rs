use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Difficulty tier of a question.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// Dense index, used to pick a per-tier shard.
    #[inline]
    pub fn index(&self) -> usize {
        match self {
            Difficulty::Easy => 0,
            Difficulty::Medium => 1,
            Difficulty::Hard => 2,
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionCategory {
    Technical,
    Behavioral,
    Situational,
    ProblemSolving,
}

impl QuestionCategory {
    /// Lenient parse for model output ("Problem Solving", "problem-solving", ...).
    pub fn parse_lenient(s: &str) -> Option<Self> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "technical" => Some(Self::Technical),
            "behavioral" | "behavioural" => Some(Self::Behavioral),
            "situational" => Some(Self::Situational),
            "problemsolving" => Some(Self::ProblemSolving),
            _ => None,
        }
    }
}

/// Which resolution path produced a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Generated,
    CachedExact,
    CachedSemantic,
    FallbackBank,
}

impl Provenance {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Generated => "generated",
            Provenance::CachedExact => "cached_exact",
            Provenance::CachedSemantic => "cached_semantic",
            Provenance::FallbackBank => "fallback_bank",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    Model,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    #[default]
    Standard,
    RapidFire,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Created,
    #[serde(alias = "active")]
    InProgress,
    Completed,
    Abandoned,
}

impl SessionStatus {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Abandoned)
    }
}

/// A question as stored in a cached or generated set, before it is issued to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionTemplate {
    pub text: String,
    pub category: QuestionCategory,
    pub difficulty: Difficulty,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default)]
    pub expected_keywords: Vec<String>,
}

/// The payload shared by both cache tiers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QuestionSet {
    pub questions: Vec<QuestionTemplate>,
}

impl QuestionSet {
    pub fn new(questions: Vec<QuestionTemplate>) -> Self {
        Self { questions }
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// First question whose text is not in `asked` (case-insensitive).
    pub fn first_unasked<'a>(&'a self, asked: &[QuestionRecord]) -> Option<&'a QuestionTemplate> {
        self.questions.iter().find(|q| {
            !asked
                .iter()
                .any(|a| a.text.eq_ignore_ascii_case(q.text.trim()))
        })
    }
}

/// A question issued to a session. Immutable once issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub text: String,
    pub category: QuestionCategory,
    pub difficulty: Difficulty,
    pub provenance: Provenance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default)]
    pub expected_keywords: Vec<String>,
}

impl QuestionRecord {
    pub fn issue(template: &QuestionTemplate, provenance: Provenance) -> Self {
        Self {
            text: template.text.trim().to_string(),
            category: template.category,
            difficulty: template.difficulty,
            provenance,
            rationale: template.rationale.clone(),
            expected_keywords: template.expected_keywords.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_index: usize,
    pub text: String,
    pub submitted_at: DateTime<Utc>,
    /// `true` when the answer was submitted by the rapid-fire timer.
    #[serde(default)]
    pub timed_out: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub question_index: usize,
    pub score: f32,
    pub source: ScoreSource,
    #[serde(with = "duration_millis")]
    pub latency: Duration,
    #[serde(default)]
    pub feedback: String,
}

impl ScoreRecord {
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

/// Final summary assembled when a session completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub total_questions: usize,
    pub average_score: f32,
    pub best_score: f32,
    pub worst_score: f32,
    pub scores: Vec<f32>,
    pub model_graded: usize,
    pub fallback_graded: usize,
    pub elapsed_secs: i64,
    pub rating: String,
}

/// One interview session. Only the orchestrator mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub mode: SessionMode,
    pub status: SessionStatus,
    pub difficulty: Difficulty,
    pub question_count: usize,
    pub questions: Vec<QuestionRecord>,
    #[serde(default)]
    pub answers: Vec<AnswerRecord>,
    #[serde(default)]
    pub scores: Vec<ScoreRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<SessionReport>,
}

impl Session {
    pub fn new(
        role: &str,
        description: Option<String>,
        mode: SessionMode,
        question_count: usize,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: role.trim().to_string(),
            description,
            mode,
            status: SessionStatus::Created,
            difficulty: Difficulty::default(),
            question_count,
            questions: Vec::new(),
            answers: Vec::new(),
            scores: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
            report: None,
        }
    }

    /// Index of the question awaiting an answer.
    #[inline]
    pub fn current_index(&self) -> usize {
        self.answers.len()
    }

    pub fn current_question(&self) -> Option<&QuestionRecord> {
        self.questions.get(self.current_index())
    }

    pub fn is_answered_in_full(&self) -> bool {
        self.answers.len() >= self.question_count
    }

    pub fn score_for(&self, question_index: usize) -> Option<&ScoreRecord> {
        self.scores
            .iter()
            .find(|s| s.question_index == question_index)
    }

    /// Appends a score unless one already exists for that question.
    ///
    /// Returns `false` (and leaves the session untouched) on a duplicate.
    pub fn record_score(&mut self, score: ScoreRecord) -> bool {
        if self.score_for(score.question_index).is_some() {
            return false;
        }
        self.scores.push(score);
        self.scores.sort_by_key(|s| s.question_index);
        true
    }

    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
