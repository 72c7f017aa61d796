//! Interview sessions and the orchestrator that drives them.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod reaper;
pub mod report;
mod slots;
pub mod stats;
pub mod types;

#[cfg(test)]
mod tests;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use orchestrator::{ReapSummary, SessionOrchestrator, SessionUpdate};
pub use reaper::Reaper;
pub use report::{build_report, rating_for};
pub use stats::{CacheEfficiency, EngineStats, StatsSnapshot};
pub use types::*;
