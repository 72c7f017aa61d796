//! Static question bank used for offline fallback and rapid-fire sets.
//!
//! The bank ships inside the binary and can be replaced at startup with a JSON file
//! of the same shape:
//!
//! ```json
//! { "version": 1, "roles": { "General": [ { "text": "...", "category": "behavioral",
//!   "difficulty": "easy", "keywords": ["..."] } ] } }
//! ```

pub mod error;


pub use error::{BankError, BankResult};

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::session::{Difficulty, QuestionCategory, QuestionRecord, QuestionTemplate};

const BUILTIN_BANK: &str = include_str!("../../data/question_bank.json");

pub const BANK_VERSION: u32 = 1;

/// Pool used when no role-specific pool matches, and to top up short pools.
pub const GENERAL_POOL: &str = "General";

#[derive(Deserialize)]
struct BankFile {
    version: u32,
    roles: BTreeMap<String, Vec<BankEntry>>,
}

#[derive(Deserialize)]
struct BankEntry {
    #[serde(alias = "question")]
    text: String,
    #[serde(default, alias = "type")]
    category: String,
    #[serde(default)]
    difficulty: String,
    #[serde(default)]
    keywords: Vec<String>,
}

impl From<BankEntry> for QuestionTemplate {
    fn from(entry: BankEntry) -> Self {
        QuestionTemplate {
            text: entry.text.trim().to_string(),
            category: QuestionCategory::parse_lenient(&entry.category)
                .unwrap_or(QuestionCategory::Technical),
            difficulty: entry.difficulty.parse().unwrap_or_default(),
            rationale: None,
            expected_keywords: entry.keywords,
        }
    }
}

/// Role-keyed pools of questions.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    roles: BTreeMap<String, Vec<QuestionTemplate>>,
}

impl QuestionBank {
    /// The bank compiled into the binary.
    pub fn builtin() -> BankResult<Self> {
        Self::from_json(BUILTIN_BANK)
    }

    pub fn from_path(path: &Path) -> BankResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| BankError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let bank = Self::from_json(&raw)?;
        info!(path = %path.display(), questions = bank.total_questions(), "Loaded question bank override");
        Ok(bank)
    }

    pub fn from_json(raw: &str) -> BankResult<Self> {
        let file: BankFile = serde_json::from_str(raw)?;
        if file.version != BANK_VERSION {
            return Err(BankError::UnsupportedVersion {
                found: file.version,
                expected: BANK_VERSION,
            });
        }

        let roles: BTreeMap<String, Vec<QuestionTemplate>> = file
            .roles
            .into_iter()
            .map(|(role, entries)| {
                let questions = entries
                    .into_iter()
                    .filter(|e| !e.text.trim().is_empty())
                    .map(QuestionTemplate::from)
                    .collect();
                (role, questions)
            })
            .collect();

        if roles.get(GENERAL_POOL).is_none_or(Vec::is_empty) {
            return Err(BankError::MissingGeneralPool(GENERAL_POOL));
        }

        Ok(Self { roles })
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.roles.keys().map(String::as_str)
    }

    pub fn total_questions(&self) -> usize {
        self.roles.values().map(Vec::len).sum()
    }

    /// Candidate questions for `role`: the matching pool followed by `General`.
    ///
    /// Matching tries the exact key, then a case-insensitive containment either way
    /// ("Senior Python Developer" finds "Python Developer"), then falls back to
    /// `General` alone. Never fails and never returns an empty list.
    pub fn load(&self, role: &str) -> Vec<QuestionTemplate> {
        let role_key = self.match_role(role);
        debug!(role, matched = role_key.unwrap_or(GENERAL_POOL), "Question bank lookup");

        let mut seen = HashSet::new();
        role_key
            .and_then(|key| self.roles.get(key))
            .into_iter()
            .flatten()
            .chain(self.roles.get(GENERAL_POOL).into_iter().flatten())
            .filter(|q| seen.insert(q.text.to_lowercase()))
            .cloned()
            .collect()
    }

    fn match_role(&self, role: &str) -> Option<&str> {
        let role = role.trim();
        if let Some((key, _)) = self.roles.get_key_value(role)
            && key != GENERAL_POOL
        {
            return Some(key);
        }

        let wanted = role.to_lowercase();
        if wanted.is_empty() {
            return None;
        }
        self.roles
            .keys()
            .filter(|key| key.as_str() != GENERAL_POOL)
            .find(|key| {
                let key = key.to_lowercase();
                wanted.contains(&key) || key.contains(&wanted)
            })
            .map(String::as_str)
    }

    /// Picks up to `count` questions for `role`, skipping any already `asked`.
    ///
    /// Role-specific questions come before `General` ones; within each, questions at
    /// `difficulty` come first, then the nearest tiers. Order within a
    /// tier is rotated by `seed`, so different sessions see different questions while
    /// a given session is reproducible. Once every question has been asked, repeats
    /// are allowed rather than returning nothing.
    pub fn select(
        &self,
        role: &str,
        difficulty: Difficulty,
        count: usize,
        seed: u64,
        asked: &[QuestionRecord],
    ) -> Vec<QuestionTemplate> {
        let pool = self.load(role);
        let role_specific = self
            .match_role(role)
            .and_then(|key| self.roles.get(key))
            .map_or(0, Vec::len);
        let is_asked =
            |q: &QuestionTemplate| asked.iter().any(|a| a.text.eq_ignore_ascii_case(&q.text));

        let mut candidates: Vec<(usize, QuestionTemplate)> = pool
            .iter()
            .enumerate()
            .filter(|(_, q)| !is_asked(q))
            .map(|(i, q)| (i, q.clone()))
            .collect();
        if candidates.is_empty() {
            candidates = pool.into_iter().enumerate().collect();
        }

        let len = candidates.len().max(1) as u64;
        let offset = seed % len;
        candidates.sort_by_key(|(i, q)| {
            let distance = q.difficulty.index().abs_diff(difficulty.index());
            let rotated = (*i as u64 + len - offset) % len;
            (*i >= role_specific, distance, rotated)
        });

        candidates.into_iter().take(count).map(|(_, q)| q).collect()
    }
}
