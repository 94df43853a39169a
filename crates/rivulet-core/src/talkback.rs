#![forbid(unsafe_code)]

//! Cancellation handle and cleanup functions.
//!
//! A [`Talkback`] is handed to the sink with `START`. Cancelling through it is
//! symmetric with natural termination: both flip the subscription to
//! terminated and run its cleanups exactly once, whichever happens first.
//!
//! Cancellation is synchronous. When [`Talkback::cancel`] returns, no further
//! `DATA`/`END` will reach the sink and every cleanup has already run.
//!
//! # Failure Modes
//!
//! - **Cleanup fails**: the error is returned from `cancel()` (or from the
//!   `complete`/`error` call that ended the subscription). It is never
//!   swallowed; a failing cleanup usually means a leaked resource.

use std::fmt;
use std::rc::Rc;

use crate::error::Result;
use crate::protocol::Signal;
use crate::subscription::{SubscriptionId, SubscriptionState, Termination};

/// Cancellation handle for one subscription. Cheaply cloneable.
#[derive(Clone)]
pub struct Talkback {
    state: Rc<SubscriptionState>,
}

impl Talkback {
    pub(crate) fn new(state: Rc<SubscriptionState>) -> Self {
        Self { state }
    }

    /// Stop the subscription.
    ///
    /// A no-op if it already ended. Otherwise marks it terminated and runs
    /// its cleanups before returning.
    pub fn cancel(&self) -> Result<()> {
        if !self.state.begin_termination(Termination::Cancelled) {
            return Ok(());
        }
        self.state.run_cleanups()
    }

    /// Send an upstream signal.
    pub fn signal(&self, signal: Signal) -> Result<()> {
        match signal {
            Signal::End => self.cancel(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.state.is_terminated()
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.state.id()
    }
}

impl fmt::Debug for Talkback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Talkback")
            .field("id", &self.state.id().raw())
            .field("terminated", &self.state.is_terminated())
            .finish()
    }
}

type CleanupFn = Box<dyn FnOnce() -> Result<()>>;

/// Teardown run exactly once when a subscription ends.
///
/// Producers return one from [`create_source`](crate::create_source); derived
/// operators usually build it from the talkbacks of the upstream
/// subscriptions they opened (`Cleanup::from(talkback)`).
#[derive(Default)]
pub struct Cleanup {
    f: Option<CleanupFn>,
}

impl Cleanup {
    /// Nothing to tear down.
    #[must_use]
    pub fn none() -> Self {
        Self { f: None }
    }

    #[must_use]
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self {
            f: Some(Box::new(move || {
                f();
                Ok(())
            })),
        }
    }

    /// A cleanup that can fail. The error propagates out of whichever call
    /// ended the subscription.
    #[must_use]
    pub fn try_new(f: impl FnOnce() -> Result<()> + 'static) -> Self {
        Self { f: Some(Box::new(f)) }
    }

    /// Run `self`, then `next`. Both always run; the first error wins.
    #[must_use]
    pub fn and(self, next: Cleanup) -> Self {
        match (self.f, next.f) {
            (None, f) | (f, None) => Self { f },
            (Some(first), Some(second)) => Self::try_new(move || {
                let first = first();
                let second = second();
                first.and(second)
            }),
        }
    }

    #[must_use]
    pub fn is_none(&self) -> bool {
        self.f.is_none()
    }

    /// Consume and run the cleanup.
    pub fn run(self) -> Result<()> {
        match self.f {
            Some(f) => f(),
            None => Ok(()),
        }
    }
}

impl From<Talkback> for Cleanup {
    fn from(talkback: Talkback) -> Self {
        Self::try_new(move || talkback.cancel())
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cleanup")
            .field("is_none", &self.f.is_none())
            .finish()
    }
}
