use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error};

use super::orchestrator::SessionOrchestrator;

/// Periodic background pass over [`SessionOrchestrator::reap`].
pub struct Reaper {
    orchestrator: SessionOrchestrator,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
}

impl Reaper {
    pub fn new(orchestrator: SessionOrchestrator) -> Self {
        let interval = orchestrator.config().reaper_interval;
        Self::with_interval(orchestrator, interval)
    }

    pub fn with_interval(orchestrator: SessionOrchestrator, interval: Duration) -> Self {
        Self {
            orchestrator,
            interval,
            shutdown: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Starts the reaper task (no-op if already running).
    pub fn start(&self) -> JoinHandle<()> {
        // AcqRel: only one caller may observe `false` and start the loop.
        if self.running.swap(true, Ordering::AcqRel) {
            return tokio::spawn(async {});
        }
        self.shutdown.store(false, Ordering::Release);

        let orchestrator = self.orchestrator.clone();
        let shutdown = Arc::clone(&self.shutdown);
        let running = Arc::clone(&self.running);
        let period = self.interval;

        tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;

            loop {
                interval.tick().await;
                if shutdown.load(Ordering::Acquire) {
                    break;
                }
                match orchestrator.reap().await {
                    Ok(summary) => debug!(?summary, "Reaper tick"),
                    Err(e) => error!(error = %e, "Reaper pass failed"),
                }
            }
            running.store(false, Ordering::Release);
        })
    }

    /// Asks the loop to exit at its next tick.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}
