//! Offline keyword-overlap scoring.
//!
//! Used whenever the remote model cannot grade an answer. Deterministic and free of
//! side effects: the same inputs always produce the same [`ScoreRecord`].

use std::collections::HashSet;
use std::time::Duration;

use crate::constants::{MAX_SCORE, SHORT_ANSWER_SCORE_CAP};
use crate::session::{ScoreRecord, ScoreSource};

const BASE_SCORE: u32 = 2;

pub struct FallbackEvaluator;

impl FallbackEvaluator {
    /// Scores `answer` against the question's expected keywords.
    ///
    /// `score = 2 + length band + keyword band`, clamped to `[0, 10]`. Empty answers
    /// score 0; answers under `min_length` characters are capped at 3.
    pub fn evaluate(
        question_index: usize,
        answer: &str,
        expected_keywords: &[String],
        min_length: usize,
    ) -> ScoreRecord {
        let answer = answer.trim();
        if answer.is_empty() {
            return Self::record(question_index, 0.0, "No answer provided.".to_string());
        }

        let normalized = normalize(answer);
        let tokens: HashSet<&str> = normalized.split(' ').collect();

        let (matched, missing): (Vec<&String>, Vec<&String>) =
            expected_keywords.iter().partition(|kw| {
                let kw = normalize(kw);
                !kw.is_empty() && (tokens.contains(kw.as_str()) || normalized.contains(&kw))
            });

        let coverage = if expected_keywords.is_empty() {
            0.0
        } else {
            matched.len() as f32 / expected_keywords.len() as f32
        };

        let chars = answer.chars().count();
        let raw = BASE_SCORE + length_band(chars) + keyword_band(coverage);
        let mut score = (raw as f32).clamp(0.0, MAX_SCORE);
        if chars < min_length {
            score = score.min(SHORT_ANSWER_SCORE_CAP);
        }

        Self::record(question_index, score, feedback(score, &matched, &missing))
    }

    fn record(question_index: usize, score: f32, feedback: String) -> ScoreRecord {
        ScoreRecord {
            question_index,
            score,
            source: ScoreSource::Fallback,
            latency: Duration::ZERO,
            feedback,
        }
    }
}

fn length_band(chars: usize) -> u32 {
    match chars {
        c if c > 100 => 3,
        c if c > 50 => 2,
        _ => 1,
    }
}

fn keyword_band(coverage: f32) -> u32 {
    if coverage > 0.7 {
        5
    } else if coverage > 0.4 {
        4
    } else if coverage > 0.2 {
        3
    } else if coverage > 0.0 {
        2
    } else {
        0
    }
}

/// Lower-case, punctuation to spaces, whitespace collapsed.
fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn feedback(score: f32, matched: &[&String], missing: &[&String]) -> String {
    let verdict = if score >= 8.0 {
        "Excellent! You covered the key concepts clearly."
    } else if score >= 6.0 {
        "Good answer."
    } else {
        "A bit thin."
    };

    let mut out = verdict.to_string();
    if !matched.is_empty() {
        out.push_str(&format!(" Covered: {}.", join(matched)));
    }
    if !missing.is_empty() {
        out.push_str(&format!(" Try to mention: {}.", join(missing)));
    }
    out
}

fn join(keywords: &[&String]) -> String {
    keywords
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
