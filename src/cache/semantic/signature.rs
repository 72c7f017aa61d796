//! Role-class signatures.
//!
//! A signature reduces a (role, description) request to the features that decide
//! whether a question set written for one posting is reusable for another.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Seniority marker extracted from the request text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seniority {
    Junior,
    Mid,
    Senior,
    #[default]
    Unspecified,
}

const SENIOR_MARKERS: &[&str] = &["senior", "lead", "principal", "staff"];
const JUNIOR_MARKERS: &[&str] = &["junior", "entry", "intern", "fresher"];
const MID_MARKERS: &[&str] = &["mid", "mid-level", "mid level", "experienced"];

/// Role families and the phrases that signal them.
const ROLE_FAMILIES: &[(&str, &[&str])] = &[
    ("python", &["python", "py", "python3", "django", "flask", "fastapi"]),
    (
        "javascript",
        &["javascript", "js", "node", "nodejs", "react", "vue", "angular", "next.js"],
    ),
    ("java", &["java", "spring", "spring boot", "maven", "gradle"]),
    ("golang", &["golang", "go"]),
    ("rust", &["rust", "rustlang"]),
    ("csharp", &[".net", "csharp", "c#", "dotnet"]),
    ("php", &["php", "laravel", "symfony"]),
    ("backend", &["backend", "back-end", "api", "server", "services", "microservices"]),
    ("frontend", &["frontend", "front-end", "ui", "ux", "web", "client"]),
    ("fullstack", &["fullstack", "full-stack", "full stack"]),
    ("devops", &["devops", "dev-ops", "sre", "infrastructure", "cloud"]),
    (
        "data",
        &["data", "ml", "ai", "machine learning", "analytics", "analyst", "deep learning"],
    ),
    ("mobile", &["mobile", "ios", "android", "react native", "flutter"]),
];

/// Skill domains and the keywords that signal them.
const SKILL_DOMAINS: &[(&str, &[&str])] = &[
    (
        "backend",
        &["api", "apis", "database", "server", "sql", "rest", "grpc", "graphql", "postgresql", "mongodb"],
    ),
    (
        "frontend",
        &["html", "css", "dom", "responsive", "accessibility", "spa", "component"],
    ),
    (
        "devops",
        &["docker", "kubernetes", "ci/cd", "jenkins", "terraform", "aws", "gcp", "azure"],
    ),
    (
        "data",
        &["pandas", "numpy", "sklearn", "tensorflow", "pytorch", "spark", "hadoop", "excel", "tableau"],
    ),
    ("mobile", &["ios", "android", "swift", "kotlin", "native"]),
    ("cloud", &["aws", "gcp", "azure", "heroku", "lambda", "serverless"]),
];

/// Normalized features of a request, used only as the semantic-cache key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoleSignature {
    pub tokens: BTreeSet<String>,
    pub seniority: Seniority,
    pub families: BTreeSet<String>,
    pub domains: BTreeSet<String>,
}

impl RoleSignature {
    pub fn from_request(role: &str, description: &str) -> Self {
        let tokens = tokenize(&format!("{} {}", role, description));
        let padded = format!(" {} ", tokens.join(" "));
        let has = |phrase: &&str| padded.contains(&format!(" {} ", phrase));

        let seniority = if SENIOR_MARKERS.iter().any(has) {
            Seniority::Senior
        } else if JUNIOR_MARKERS.iter().any(has) {
            Seniority::Junior
        } else if MID_MARKERS.iter().any(has) {
            Seniority::Mid
        } else {
            Seniority::Unspecified
        };

        let families = ROLE_FAMILIES
            .iter()
            .filter(|(_, phrases)| phrases.iter().any(has))
            .map(|(family, _)| family.to_string())
            .collect();

        let domains = SKILL_DOMAINS
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(has))
            .map(|(domain, _)| domain.to_string())
            .collect();

        Self {
            tokens: tokens.into_iter().collect(),
            seniority,
            families,
            domains,
        }
    }

    /// `true` when nothing recognizable was extracted.
    pub fn is_featureless(&self) -> bool {
        self.families.is_empty() && self.domains.is_empty()
    }
}

/// Lower-cases and splits on anything that is not part of a technology name.
///
/// `#`, `+`, `.`, `/` and `-` survive inside tokens (`c#`, `c++`, `next.js`, `ci/cd`);
/// trailing sentence punctuation is stripped.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || matches!(c, '#' | '+' | '.' | '/' | '-')))
        .map(|t| t.trim_end_matches(['.', '/', '-']))
        .map(|t| t.trim_start_matches(['/', '-']))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
