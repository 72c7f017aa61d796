//! Moving-average difficulty selection.

use crate::constants::{DEFAULT_DIFFICULTY_WINDOW, HARD_TIER_MIN_AVERAGE, MEDIUM_TIER_MIN_AVERAGE};
use crate::session::{Difficulty, ScoreRecord};

/// Picks the next question's tier from a trailing window of scores.
///
/// Pure: the result depends only on the scores passed in, so replaying a session's
/// history always yields the same tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyController {
    window: usize,
}

impl Default for DifficultyController {
    fn default() -> Self {
        Self::new(DEFAULT_DIFFICULTY_WINDOW)
    }
}

impl DifficultyController {
    /// A zero window is treated as 1.
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Mean of the last `window` scores (all of them if fewer), or `None` if empty.
    pub fn moving_average(&self, scores: &[ScoreRecord]) -> Option<f32> {
        if scores.is_empty() {
            return None;
        }
        let start = scores.len().saturating_sub(self.window);
        let tail = &scores[start..];
        Some(tail.iter().map(|s| s.score).sum::<f32>() / tail.len() as f32)
    }

    pub fn next_tier(&self, scores: &[ScoreRecord]) -> Difficulty {
        self.moving_average(scores)
            .map_or(Difficulty::default(), Self::tier_for_average)
    }

    pub fn tier_for_average(average: f32) -> Difficulty {
        if average >= HARD_TIER_MIN_AVERAGE {
            Difficulty::Hard
        } else if average >= MEDIUM_TIER_MIN_AVERAGE {
            Difficulty::Medium
        } else {
            Difficulty::Easy
        }
    }

    /// Tier in force before each question, replayed from a full score history.
    pub fn replay(&self, scores: &[ScoreRecord]) -> Vec<Difficulty> {
        (0..=scores.len())
            .map(|n| self.next_tier(&scores[..n]))
            .collect()
    }
}
