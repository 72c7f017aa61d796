//! Prompt text and response parsing for JSON-returning chat models.

use serde::Deserialize;
use serde_json::Value;

use super::error::{ModelError, ModelResult};
use super::types::{BatchContext, BatchItem, Evaluation};
use crate::constants::MAX_SCORE;
use crate::session::{Difficulty, QuestionCategory, QuestionSet, QuestionTemplate};

pub const SYSTEM_PROMPT: &str = "You are an experienced technical interviewer. \
Always answer with valid JSON only: no markdown, no code fences, no commentary.";

const MAX_DESCRIPTION_CHARS: usize = 800;

pub fn question_set_prompt(role: &str, description: &str, difficulty: Difficulty, count: usize) -> String {
    format!(
        "Generate {count} interview questions for the role: {role}\n\
         Job requirements: {description}\n\
         Difficulty: {difficulty}\n\n\
         Return a JSON array. Each element must look like:\n\
         {{\"question\": \"...\", \"type\": \"technical|behavioral|situational|problem_solving\", \
         \"difficulty\": \"{difficulty}\", \"why_asked\": \"...\", \
         \"sample_answer_points\": [\"keyword\", \"keyword\"]}}\n\
         sample_answer_points are short keywords a strong answer would mention.",
        description = truncate(description, MAX_DESCRIPTION_CHARS),
    )
}

pub fn evaluation_prompt(question: &str, answer: &str, expected: &[String]) -> String {
    format!(
        "Evaluate this interview answer.\n\n\
         QUESTION: {question}\n\
         ANSWER: {answer}\n\
         EXPECTED POINTS: {expected}\n\n\
         Return {{\"score\": 7, \"feedback\": \"one or two sentences\"}}. \
         score is an integer from 1 to 10.",
        expected = if expected.is_empty() {
            "good concrete examples".to_string()
        } else {
            expected.join(", ")
        },
    )
}

pub fn batch_prompt(context: &BatchContext, items: &[BatchItem]) -> String {
    let mut body = String::new();
    for (i, item) in items.iter().enumerate() {
        body.push_str(&format!(
            "{n}. QUESTION: {q}\n   ANSWER: {a}\n   EXPECTED: {e}\n",
            n = i + 1,
            q = item.question,
            a = if item.answer.trim().is_empty() { "(no answer)" } else { item.answer.as_str() },
            e = item.expected_keywords.join(", "),
        ));
    }
    format!(
        "Evaluate these {count} rapid-fire answers for the role: {role}\n\
         Context: {description}\n\n{body}\n\
         Return a JSON array with exactly {count} elements, in order:\n\
         [{{\"score\": 7, \"feedback\": \"...\"}}]\n\
         score is an integer from 0 to 10; unanswered questions score 0.",
        count = items.len(),
        role = context.role,
        description = truncate(&context.description, MAX_DESCRIPTION_CHARS),
    )
}

/// Strips code fences and control characters that models like to add.
pub fn clean_json_text(text: &str) -> String {
    let mut t = text.trim();
    if let Some(rest) = t.strip_prefix("```") {
        t = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    }
    if let Some(rest) = t.strip_suffix("```") {
        t = rest;
    }
    t.chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .collect::<String>()
        .trim()
        .to_string()
}

#[derive(Deserialize)]
struct RawQuestion {
    #[serde(alias = "text")]
    question: String,
    #[serde(default, alias = "category", rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    difficulty: Option<String>,
    #[serde(default, alias = "rationale")]
    why_asked: Option<String>,
    #[serde(default, alias = "keywords")]
    sample_answer_points: Vec<String>,
}

pub fn parse_question_set(text: &str, difficulty: Difficulty) -> ModelResult<QuestionSet> {
    let value = parse_value(text)?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("questions") {
            Some(Value::Array(items)) => items,
            _ => vec![Value::Object(obj)],
        },
        _ => return Err(ModelError::InvalidResponse("expected a JSON array".into())),
    };

    let questions: Vec<QuestionTemplate> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<RawQuestion>(item).ok())
        .filter(|q| !q.question.trim().is_empty())
        .map(|q| QuestionTemplate {
            text: q.question.trim().to_string(),
            category: q
                .kind
                .as_deref()
                .and_then(QuestionCategory::parse_lenient)
                .unwrap_or(QuestionCategory::Technical),
            difficulty: q
                .difficulty
                .as_deref()
                .and_then(|d| d.parse().ok())
                .unwrap_or(difficulty),
            rationale: q.why_asked.filter(|r| !r.trim().is_empty()),
            expected_keywords: q
                .sample_answer_points
                .into_iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        })
        .collect();

    if questions.is_empty() {
        return Err(ModelError::InvalidResponse("no usable questions".into()));
    }
    Ok(QuestionSet::new(questions))
}

pub fn parse_evaluation(text: &str) -> ModelResult<Evaluation> {
    evaluation_from_value(parse_value(text)?)
}

pub fn parse_batch(text: &str, expected: usize) -> ModelResult<Vec<Evaluation>> {
    let items = match parse_value(text)? {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("evaluations") {
            Some(Value::Array(items)) => items,
            _ => return Err(ModelError::InvalidResponse("expected a JSON array".into())),
        },
        _ => return Err(ModelError::InvalidResponse("expected a JSON array".into())),
    };

    if items.len() != expected {
        return Err(ModelError::CountMismatch {
            expected,
            got: items.len(),
        });
    }
    items.into_iter().map(evaluation_from_value).collect()
}

fn evaluation_from_value(value: Value) -> ModelResult<Evaluation> {
    let score = match value.get("score") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| ModelError::InvalidResponse("missing numeric score".into()))?;

    let feedback = value
        .get("feedback")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(Evaluation {
        score: (score as f32).clamp(0.0, MAX_SCORE),
        feedback,
    })
}

fn parse_value(text: &str) -> ModelResult<Value> {
    let cleaned = clean_json_text(text);
    serde_json::from_str(&cleaned).map_err(|e| ModelError::InvalidResponse(e.to_string()))
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
