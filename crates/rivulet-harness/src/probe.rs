#![forbid(unsafe_code)]

//! Cleanup counting.

use std::cell::Cell;
use std::rc::Rc;

use rivulet_core::{Cleanup, RivuletError};

/// Hands out cleanups that bump a shared counter when they run.
///
/// Clones share the counter.
#[derive(Debug, Clone, Default)]
pub struct CleanupProbe {
    runs: Rc<Cell<usize>>,
}

impl CleanupProbe {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn cleanup(&self) -> Cleanup {
        let runs = Rc::clone(&self.runs);
        Cleanup::new(move || runs.set(runs.get() + 1))
    }

    /// A cleanup that counts its run, then fails with `reason`.
    #[must_use]
    pub fn failing_cleanup(&self, reason: &'static str) -> Cleanup {
        let runs = Rc::clone(&self.runs);
        Cleanup::try_new(move || {
            runs.set(runs.get() + 1);
            Err(RivuletError::cleanup(reason))
        })
    }

    /// How many cleanups from this probe have run.
    #[must_use]
    pub fn count(&self) -> usize {
        self.runs.get()
    }
}
