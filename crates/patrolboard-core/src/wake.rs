//! Coalescing cross-task wake signal.
//!
//! A single-slot "has a refresh been requested since last consumed?"
//! notification. Multiple sets before a take collapse into one, so a burst
//! of push messages triggers exactly one extra fetch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct WakeSignal {
    flag: AtomicBool,
    notify: Notify,
}

impl WakeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a refresh. Safe to call from any task; concurrent sets
    /// coalesce.
    pub fn set(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Consume the pending request, if any. Test-and-clear in one atomic
    /// step: a set racing with a take is either observed by this take or
    /// left pending for the next one, never lost or duplicated.
    pub fn take(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }

    /// Peek without consuming.
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Wait until the signal is set or `cap` elapses, whichever comes
    /// first. Does not consume the signal.
    pub async fn wait(&self, cap: Duration) {
        let notified = self.notify.notified();
        if self.flag.load(Ordering::SeqCst) {
            return;
        }
        let _ = tokio::time::timeout(cap, notified).await;
    }
}
