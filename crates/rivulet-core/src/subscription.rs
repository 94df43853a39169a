#![forbid(unsafe_code)]

//! Per-subscription state.
//!
//! Every call of a source creates one [`SubscriptionState`], shared between
//! the producer's [`Emitter`](crate::Emitter) and the sink's
//! [`Talkback`](crate::Talkback). It owns the `terminated` flag and the
//! registered cleanups; nothing about a subscription lives in ambient
//! closure captures.
//!
//! # Invariants
//!
//! 1. `terminated` goes `false → true` exactly once and never reverts.
//! 2. Whichever path flips it first (completion, error, cancellation) is the
//!    only one that runs the cleanups. Every other path is a no-op.
//! 3. Each registered cleanup runs exactly once. A cleanup registered after
//!    termination runs immediately, at registration.
//!
//! # Failure Modes
//!
//! - **Cleanup fails**: the remaining cleanups still run, then the first
//!   failure is returned to whoever triggered termination.

use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Result;
use crate::talkback::Cleanup;

// ─── Id generation ───────────────────────────────────────────────────────────

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

// ─── Metrics counters ────────────────────────────────────────────────────────

static SUBSCRIPTIONS_TOTAL: AtomicU64 = AtomicU64::new(0);
static CANCELLATIONS_TOTAL: AtomicU64 = AtomicU64::new(0);
static CLEANUP_FAILURES_TOTAL: AtomicU64 = AtomicU64::new(0);

/// Total number of subscriptions opened in this process.
#[must_use]
pub fn subscriptions_total() -> u64 {
    SUBSCRIPTIONS_TOTAL.load(Ordering::Relaxed)
}

/// Total number of accepted cancellations (first `Signal::End` per subscription).
#[must_use]
pub fn cancellations_total() -> u64 {
    CANCELLATIONS_TOTAL.load(Ordering::Relaxed)
}

/// Total number of cleanup functions that returned an error.
#[must_use]
pub fn cleanup_failures_total() -> u64 {
    CLEANUP_FAILURES_TOTAL.load(Ordering::Relaxed)
}

/// Process-unique identifier of one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn next() -> Self {
        Self(NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// What ended a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Termination {
    Completed,
    Errored,
    Cancelled,
    /// The sink or producer failed during subscribe.
    Abandoned,
}

pub(crate) struct SubscriptionState {
    id: SubscriptionId,
    terminated: Cell<bool>,
    cleanups: RefCell<Vec<Cleanup>>,
}

impl SubscriptionState {
    pub(crate) fn new() -> Self {
        SUBSCRIPTIONS_TOTAL.fetch_add(1, Ordering::Relaxed);
        let id = SubscriptionId::next();
        log_trace!(subscription = id.raw(), "subscription opened");
        Self {
            id,
            terminated: Cell::new(false),
            cleanups: RefCell::new(Vec::new()),
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> SubscriptionId {
        self.id
    }

    #[inline]
    pub(crate) fn is_terminated(&self) -> bool {
        self.terminated.get()
    }

    /// Flip to terminated. Returns `false` if another path already did.
    pub(crate) fn begin_termination(&self, why: Termination) -> bool {
        if self.terminated.replace(true) {
            return false;
        }
        if why == Termination::Cancelled {
            CANCELLATIONS_TOTAL.fetch_add(1, Ordering::Relaxed);
            log_debug!(subscription = self.id.raw(), "subscription cancelled");
        } else {
            log_trace!(subscription = self.id.raw(), reason = ?why, "subscription ended");
        }
        true
    }

    pub(crate) fn add_cleanup(&self, cleanup: Cleanup) -> Result<()> {
        if cleanup.is_none() {
            return Ok(());
        }
        if self.terminated.get() {
            return self.invoke(cleanup);
        }
        self.cleanups.borrow_mut().push(cleanup);
        Ok(())
    }

    /// Run every registered cleanup in registration order.
    ///
    /// Only called by the path that won [`begin_termination`](Self::begin_termination).
    pub(crate) fn run_cleanups(&self) -> Result<()> {
        let pending = std::mem::take(&mut *self.cleanups.borrow_mut());
        let mut first_failure = None;
        for cleanup in pending {
            if let Err(err) = self.invoke(cleanup) {
                first_failure.get_or_insert(err);
            }
        }
        first_failure.map_or(Ok(()), Err)
    }

    fn invoke(&self, cleanup: Cleanup) -> Result<()> {
        let result = cleanup.run();
        if result.is_err() {
            CLEANUP_FAILURES_TOTAL.fetch_add(1, Ordering::Relaxed);
            log_warn!(subscription = self.id.raw(), "cleanup failed");
        }
        result
    }
}
