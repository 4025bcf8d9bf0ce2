//! Save coalescing
//!
//! Keystroke-driven saves are merged into one write after a quiet period.
//! The buffer holds at most one version per note uuid; a newer version
//! replaces the buffered one and moves to the end.
//!
//! Every write also arms a watchdog. If the host does not acknowledge in
//! time, the user is told their changes may be lost.

use notebridge_protocol::NoteItem;
use std::time::Duration;

use crate::scheduler::ScheduledTask;

pub type SaveCallback = Box<dyn FnOnce() + Send>;

/// Runs on the items right before they are sent, inside the debounce cycle.
pub type Presave = Box<dyn FnOnce(&mut [NoteItem]) + Send>;

/// Parameters of one write.
pub struct PendingSave {
    pub items: Vec<NoteItem>,
    pub presave: Option<Presave>,
    pub callback: Option<SaveCallback>,
}

pub struct SaveCoalescer {
    delay: Option<Duration>,
    pending: Option<PendingSave>,
    timer: Option<ScheduledTask>,
    /// Bumped on every merge; a timer may only flush its own generation
    generation: u64,
    watchdogs: Vec<ScheduledTask>,
}

impl SaveCoalescer {
    pub fn new(delay: Option<Duration>) -> Self {
        Self {
            delay,
            pending: None,
            timer: None,
            generation: 0,
            watchdogs: Vec::new(),
        }
    }

    pub fn set_delay(&mut self, delay: Option<Duration>) {
        self.delay = delay;
    }

    /// Debounce delay for a request, `None` when it must go out now.
    pub fn debounce_for(&self, skip_debounce: bool) -> Option<Duration> {
        if skip_debounce {
            None
        } else {
            self.delay
        }
    }

    /// Merge `items` into the buffer and make the given presave and callback
    /// the live ones. Cancels the running timer; the caller arms a new one
    /// carrying the returned generation.
    pub fn merge(
        &mut self,
        items: Vec<NoteItem>,
        presave: Option<Presave>,
        callback: Option<SaveCallback>,
    ) -> u64 {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }

        let mut buffer = self
            .pending
            .take()
            .map(|pending| pending.items)
            .unwrap_or_default();
        for item in items {
            buffer.retain(|buffered| buffered.uuid != item.uuid);
            buffer.push(item);
        }

        self.pending = Some(PendingSave {
            items: buffer,
            presave,
            callback,
        });
        self.generation += 1;
        self.generation
    }

    pub fn arm(&mut self, timer: ScheduledTask) {
        self.timer = Some(timer);
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_some()
    }

    /// Called by the timer of `generation` when it fires.
    pub fn take_expired(&mut self, generation: u64) -> Option<PendingSave> {
        if generation != self.generation || self.timer.is_none() {
            return None;
        }
        // The timer is the caller; let it finish instead of aborting it.
        self.timer = None;
        self.pending.take()
    }

    /// Cancel the running timer and hand back what it would have written.
    pub fn take_live(&mut self) -> Option<PendingSave> {
        let timer = self.timer.take()?;
        timer.cancel();
        self.pending.take()
    }

    pub fn pending_uuids(&self) -> Vec<String> {
        self.pending
            .as_ref()
            .map(|pending| pending.items.iter().map(|item| item.uuid.clone()).collect())
            .unwrap_or_default()
    }

    pub fn track_watchdog(&mut self, watchdog: ScheduledTask) {
        self.watchdogs.retain(|task| !task.is_finished());
        self.watchdogs.push(watchdog);
    }

    /// Cancel every watchdog. Returns how many were tracked.
    pub fn cancel_watchdogs(&mut self) -> usize {
        let count = self.watchdogs.len();
        for watchdog in self.watchdogs.drain(..) {
            watchdog.cancel();
        }
        count
    }
}
