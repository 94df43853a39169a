#![forbid(unsafe_code)]

//! Host scheduling seam.
//!
//! The primitive itself never schedules anything: a source either finishes
//! synchronously or registers callbacks with whatever host event loop it
//! adapts. Derived operators that need time (throttle, debounce, timeout,
//! interval) take an explicit [`Scheduler`] handle instead of reaching for a
//! global timer service.
//!
//! [`ManualScheduler`] is a deterministic, manually advanced implementation
//! for tests and for hosts that drive their own loop.
//!
//! # Invariants
//!
//! 1. Tasks run in `(due time, scheduling order)` order.
//! 2. A cancelled task never runs.
//! 3. A task scheduled from inside a running task, due within the window
//!    being advanced, runs in the same `advance` call.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;

use web_time::{Duration, Instant};

use crate::error::Result;

/// Deferred work. Its error is reported by whoever drives the host loop.
pub type Task = Box<dyn FnOnce() -> Result<()>>;

/// Handle on a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Timer service provided by the host.
pub trait Scheduler {
    /// Current time according to this scheduler.
    fn now(&self) -> Instant;

    /// Run `task` once, `delay` from now.
    fn schedule(&self, delay: Duration, task: Task) -> TimerId;

    /// Cancel a pending task. Returns `false` if it already ran or was cancelled.
    fn cancel(&self, timer: TimerId) -> bool;
}

/// Virtual-time scheduler advanced explicitly by its owner.
pub struct ManualScheduler {
    epoch: Instant,
    elapsed: Cell<Duration>,
    next_seq: Cell<u64>,
    queue: RefCell<BTreeMap<(Duration, u64), Task>>,
}

impl ManualScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            elapsed: Cell::new(Duration::ZERO),
            next_seq: Cell::new(1),
            queue: RefCell::new(BTreeMap::new()),
        }
    }

    /// Virtual time elapsed since construction.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed.get()
    }

    /// Number of tasks waiting to run.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Move virtual time forward by `delta`, running every task that falls due.
    ///
    /// Returns how many tasks ran. Stops at the first failing task and
    /// returns its error; time stays at that task's due time and later tasks
    /// stay queued.
    pub fn advance(&self, delta: Duration) -> Result<usize> {
        let target = self.elapsed.get().saturating_add(delta);
        let mut ran = 0;
        while let Some((due, task)) = self.pop_due(target) {
            self.elapsed.set(due.max(self.elapsed.get()));
            ran += 1;
            task()?;
        }
        self.elapsed.set(target);
        Ok(ran)
    }

    /// Jump to the earliest pending task and run everything due at that instant.
    ///
    /// Returns how many tasks ran; zero if nothing was pending.
    pub fn run_next(&self) -> Result<usize> {
        let next_due = self.queue.borrow().first_key_value().map(|(&(due, _), _)| due);
        match next_due {
            Some(due) => self.advance(due.saturating_sub(self.elapsed.get())),
            None => Ok(0),
        }
    }

    /// Run tasks until none are pending.
    ///
    /// Never returns for a source that keeps rescheduling itself, such as an
    /// interval that nobody cancels.
    pub fn run_until_idle(&self) -> Result<usize> {
        let mut ran = 0;
        while self.pending() > 0 {
            ran += self.run_next()?;
        }
        Ok(ran)
    }

    fn pop_due(&self, target: Duration) -> Option<(Duration, Task)> {
        let mut queue = self.queue.borrow_mut();
        let due_now = queue
            .first_key_value()
            .is_some_and(|(&(due, _), _)| due <= target);
        if !due_now {
            return None;
        }
        queue.pop_first().map(|((due, _), task)| (due, task))
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> Instant {
        self.epoch + self.elapsed.get()
    }

    fn schedule(&self, delay: Duration, task: Task) -> TimerId {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        let due = self.elapsed.get().saturating_add(delay);
        self.queue.borrow_mut().insert((due, seq), task);
        TimerId::new(seq)
    }

    fn cancel(&self, timer: TimerId) -> bool {
        let mut queue = self.queue.borrow_mut();
        let key = queue.keys().find(|(_, seq)| *seq == timer.raw()).copied();
        key.is_some_and(|key| queue.remove(&key).is_some())
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("elapsed", &self.elapsed.get())
            .field("pending", &self.pending())
            .finish()
    }
}
