//! Cancellable scheduled tasks
//!
//! A spawned sleep plus a handle to cancel it. Backs both the save debounce and
//! the save watchdog. Must be created from within a Tokio runtime.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug)]
pub struct ScheduledTask {
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Run `f` once `delay` has elapsed, unless cancelled first.
    pub fn after<F>(delay: Duration, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let deadline = Instant::now() + delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            f();
        });
        Self { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancel the task. A task that already started running finishes.
    pub fn cancel(self) {
        self.handle.abort();
    }
}
