use std::path::PathBuf;

use crate::session::SessionOrchestrator;

#[derive(Clone)]
pub struct HandlerState {
    pub orchestrator: SessionOrchestrator,

    /// Root of the file-backed store, `None` when running in memory.
    pub storage_path: Option<PathBuf>,
}

impl HandlerState {
    pub fn new(orchestrator: SessionOrchestrator, storage_path: Option<PathBuf>) -> Self {
        Self {
            orchestrator,
            storage_path,
        }
    }
}
