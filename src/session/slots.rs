use std::sync::Arc;

use moka::sync::Cache;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};
use tokio::task::AbortHandle;

struct ArmedTimer {
    question_index: usize,
    handle: AbortHandle,
}

/// Per-session serialization point and timer owner.
pub(crate) struct SessionSlot {
    lock: AsyncMutex<()>,
    timer: Mutex<Option<ArmedTimer>>,
}

impl SessionSlot {
    fn new() -> Self {
        Self {
            lock: AsyncMutex::new(()),
            timer: Mutex::new(None),
        }
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }

    /// Stores the timer for `question_index`, aborting any previous one.
    pub(crate) fn arm(&self, question_index: usize, handle: AbortHandle) {
        let previous = self.timer.lock().replace(ArmedTimer {
            question_index,
            handle,
        });
        if let Some(previous) = previous {
            previous.handle.abort();
        }
    }

    /// Aborts the armed timer. Callers must hold the session lock.
    pub(crate) fn cancel_timer(&self) -> bool {
        match self.timer.lock().take() {
            Some(timer) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Forgets the timer for `question_index` without aborting it.
    ///
    /// Used by the timer task itself once it holds the session lock.
    pub(crate) fn disarm(&self, question_index: usize) -> bool {
        let mut timer = self.timer.lock();
        if timer
            .as_ref()
            .is_some_and(|t| t.question_index == question_index)
        {
            *timer = None;
            true
        } else {
            false
        }
    }

    #[cfg(test)]
    pub(crate) fn armed_index(&self) -> Option<usize> {
        self.timer.lock().as_ref().map(|t| t.question_index)
    }
}

/// Session id -> slot. Lookups go through `get_with`, so distinct sessions never
/// contend on a shared lock.
pub(crate) struct SlotMap {
    slots: Cache<String, Arc<SessionSlot>>,
}

impl SlotMap {
    pub(crate) fn new() -> Self {
        Self {
            slots: Cache::builder().build(),
        }
    }

    pub(crate) fn get(&self, session_id: &str) -> Arc<SessionSlot> {
        self.slots
            .get_with(session_id.to_string(), || Arc::new(SessionSlot::new()))
    }

    #[cfg(test)]
    pub(crate) fn peek(&self, session_id: &str) -> Option<Arc<SessionSlot>> {
        self.slots.get(session_id)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> u64 {
        self.slots.run_pending_tasks();
        self.slots.entry_count()
    }

    /// Drops the slot and aborts its timer.
    pub(crate) fn remove(&self, session_id: &str) {
        if let Some(slot) = self.slots.remove(session_id) {
            slot.cancel_timer();
        }
    }
}
