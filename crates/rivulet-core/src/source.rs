#![forbid(unsafe_code)]

//! The source factory.
//!
//! [`create_source`] turns a producer function into a reusable [`Source`].
//! The source is stateless: every [`Source::subscribe`] builds a fresh
//! subscription (its own `terminated` flag and cleanup list) and runs the
//! producer again. Nothing is shared between two subscriptions unless a
//! multicast operator is put in front.
//!
//! # Subscribe sequence
//!
//! 1. Allocate the per-subscription state and its [`Talkback`].
//! 2. Deliver `START(talkback)` to the sink, before the producer runs.
//! 3. Run the producer synchronously with an [`Emitter`].
//! 4. Register the cleanup the producer returned. If the subscription ended
//!    while the producer was running, that cleanup runs right away.
//!
//! # Invariants
//!
//! 1. After termination, `next`/`complete`/`error` are silent no-ops.
//! 2. Data is delivered in call order. Reentrant emissions (a sink making its
//!    own producer emit) are delivered depth-first, as direct calls; there is
//!    no internal queue.
//! 3. Every cleanup runs exactly once, whichever side ends the subscription.
//!
//! # Failure Modes
//!
//! - **Producer fails**: `subscribe` returns the error. The sink only ever
//!   saw `START`; no `END` is sent. The returned cleanup was never produced,
//!   so there is nothing to run, but cleanups registered earlier through
//!   [`Emitter::add_cleanup`] are run so that upstream subscriptions the
//!   producer already opened do not leak. If one of those cleanups fails as
//!   well, the producer error is still the one returned; the cleanup failure
//!   is dropped after being counted in
//!   [`cleanup_failures_total`](crate::subscription::cleanup_failures_total)
//!   and logged.
//! - **Sink fails on `START`**: `subscribe` returns the error and the
//!   producer is not run.
//! - **Deep synchronous recursion**: reentrant emission uses the native call
//!   stack. Bounding its depth is the producer's responsibility.

use std::convert::Infallible;
use std::fmt;
use std::rc::Rc;

use crate::error::Result;
use crate::protocol::Message;
use crate::sink::Sink;
use crate::subscription::{SubscriptionId, SubscriptionState, Termination};
use crate::talkback::{Cleanup, Talkback};

type SubscribeFn<T, E> = Rc<dyn Fn(Sink<T, E>) -> Result<Talkback>>;

/// A reusable, independently subscribable stream of `T` that may fail with `E`.
///
/// Cloning a `Source` clones the handle, not a subscription.
pub struct Source<T, E = Infallible> {
    subscribe: SubscribeFn<T, E>,
}

impl<T, E> Clone for Source<T, E> {
    fn clone(&self) -> Self {
        Self {
            subscribe: Rc::clone(&self.subscribe),
        }
    }
}

impl<T, E> fmt::Debug for Source<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source").finish_non_exhaustive()
    }
}

impl<T: 'static, E: 'static> Source<T, E> {
    /// Same as [`create_source`].
    pub fn new<P>(producer: P) -> Self
    where
        P: Fn(Emitter<T, E>) -> Result<Cleanup> + 'static,
    {
        create_source(producer)
    }

    /// Start a new, independent subscription.
    ///
    /// Returns the subscription's talkback (the same one the sink received
    /// with `START`).
    pub fn subscribe(&self, sink: Sink<T, E>) -> Result<Talkback> {
        (self.subscribe)(sink)
    }
}

/// Build a [`Source`] from a producer.
///
/// The producer runs once per subscription. It pushes through the
/// [`Emitter`] it receives, synchronously or later from host callbacks, and
/// returns the [`Cleanup`] that releases whatever it acquired.
///
/// ```
/// use rivulet_core::{Cleanup, Message, Sink, create_source};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let answer = create_source::<u32, (), _>(|out| {
///     out.next(42)?;
///     out.complete()?;
///     Ok(Cleanup::none())
/// });
///
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let log = Rc::clone(&seen);
/// answer
///     .subscribe(Sink::new(move |msg| match msg {
///         Message::Data(v) => log.borrow_mut().push(Some(v)),
///         Message::End(_) => log.borrow_mut().push(None),
///         Message::Start(_) => {}
///     }))
///     .unwrap();
///
/// assert_eq!(*seen.borrow(), vec![Some(42), None]);
/// ```
pub fn create_source<T, E, P>(producer: P) -> Source<T, E>
where
    T: 'static,
    E: 'static,
    P: Fn(Emitter<T, E>) -> Result<Cleanup> + 'static,
{
    Source {
        subscribe: Rc::new(move |sink: Sink<T, E>| {
            let state = Rc::new(SubscriptionState::new());
            let talkback = Talkback::new(Rc::clone(&state));

            if let Err(err) = sink.send(Message::Start(talkback.clone())) {
                state.begin_termination(Termination::Abandoned);
                return Err(err);
            }

            let emitter = Emitter {
                state: Rc::clone(&state),
                sink,
            };
            match producer(emitter) {
                Ok(cleanup) => {
                    state.add_cleanup(cleanup)?;
                    Ok(talkback)
                }
                Err(err) => {
                    if state.begin_termination(Termination::Abandoned) {
                        // Cleanup failures are counted and logged by the state;
                        // the producer error takes precedence.
                        state.run_cleanups().ok();
                    }
                    Err(err)
                }
            }
        }),
    }
}

/// The producer's handle on one subscription.
///
/// Cloneable, so it can be captured by callbacks that fire later.
pub struct Emitter<T, E> {
    state: Rc<SubscriptionState>,
    sink: Sink<T, E>,
}

impl<T, E> Clone for Emitter<T, E> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
            sink: self.sink.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Emitter<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("id", &self.state.id().raw())
            .field("terminated", &self.state.is_terminated())
            .finish()
    }
}

impl<T: 'static, E: 'static> Emitter<T, E> {
    /// Deliver `DATA(value)`. Ignored after termination.
    pub fn next(&self, value: T) -> Result<()> {
        if self.state.is_terminated() {
            return Ok(());
        }
        self.sink.send(Message::Data(value))
    }

    /// Deliver `END` without error, then run cleanups. Ignored after termination.
    pub fn complete(&self) -> Result<()> {
        self.finish(None, Termination::Completed)
    }

    /// Deliver `END(err)`, then run cleanups. Ignored after termination.
    pub fn error(&self, err: E) -> Result<()> {
        self.finish(Some(err), Termination::Errored)
    }

    fn finish(&self, err: Option<E>, why: Termination) -> Result<()> {
        if !self.state.begin_termination(why) {
            return Ok(());
        }
        let delivered = self.sink.send(Message::End(err));
        let cleaned = self.state.run_cleanups();
        delivered.and(cleaned)
    }
}

impl<T, E> Emitter<T, E> {
    /// Register teardown before the producer returns.
    ///
    /// Derived operators use this to tie an upstream talkback to their own
    /// subscription as soon as they receive it, so that a downstream
    /// cancellation during a synchronous upstream emission reaches upstream
    /// immediately. Runs at once if the subscription already ended.
    pub fn add_cleanup(&self, cleanup: Cleanup) -> Result<()> {
        self.state.add_cleanup(cleanup)
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

    /// A talkback for this subscription, for producers that end it themselves
    /// without sending `END`.
    #[must_use]
    pub fn talkback(&self) -> Talkback {
        Talkback::new(Rc::clone(&self.state))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RivuletError;
    use crate::protocol::MessageKind;
    use crate::scheduler::{ManualScheduler, Scheduler};
    use std::cell::{Cell, RefCell};
    use web_time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    enum Seen {
        Start,
        Data(i32),
        End(Option<&'static str>),
    }

    /// Records everything and keeps the talkback.
    struct Probe {
        seen: Rc<RefCell<Vec<Seen>>>,
        talkback: Rc<RefCell<Option<Talkback>>>,
    }

    impl Probe {
        fn new() -> Self {
            Self {
                seen: Rc::new(RefCell::new(Vec::new())),
                talkback: Rc::new(RefCell::new(None)),
            }
        }

        fn sink(&self) -> Sink<i32, &'static str> {
            let seen = Rc::clone(&self.seen);
            let slot = Rc::clone(&self.talkback);
            Sink::new(move |msg| match msg {
                Message::Start(tb) => {
                    *slot.borrow_mut() = Some(tb);
                    seen.borrow_mut().push(Seen::Start);
                }
                Message::Data(v) => seen.borrow_mut().push(Seen::Data(v)),
                Message::End(e) => seen.borrow_mut().push(Seen::End(e)),
            })
        }

        fn seen(&self) -> Vec<Seen> {
            self.seen.borrow().clone()
        }

        fn cancel(&self) -> Result<()> {
            let talkback = self.talkback.borrow().clone();
            talkback.map_or(Ok(()), |tb| tb.cancel())
        }
    }

    fn counter() -> (Rc<Cell<u32>>, impl Fn() -> Cleanup) {
        let count = Rc::new(Cell::new(0));
        let handle = Rc::clone(&count);
        (count, move || {
            let count = Rc::clone(&handle);
            Cleanup::new(move || count.set(count.get() + 1))
        })
    }

    #[test]
    fn single_value_then_complete() {
        let source = create_source(|out: Emitter<i32, &'static str>| {
            out.next(42)?;
            out.complete()?;
            Ok(Cleanup::none())
        });
        let probe = Probe::new();
        source.subscribe(probe.sink()).unwrap();

        assert_eq!(
            probe.seen(),
            vec![Seen::Start, Seen::Data(42), Seen::End(None)]
        );
    }

    #[test]
    fn start_precedes_producer() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let in_producer = Rc::clone(&order);
        let source = create_source(move |_out: Emitter<i32, &'static str>| {
            in_producer.borrow_mut().push(MessageKind::Data);
            Ok(Cleanup::none())
        });
        let in_sink = Rc::clone(&order);
        source
            .subscribe(Sink::new(move |msg: Message<i32, &'static str>| {
                in_sink.borrow_mut().push(msg.kind());
            }))
            .unwrap();

        assert_eq!(*order.borrow(), vec![MessageKind::Start, MessageKind::Data]);
    }

    #[test]
    fn emissions_after_complete_are_dropped() {
        let source = create_source(|out: Emitter<i32, &'static str>| {
            out.next(1)?;
            out.complete()?;
            out.next(2)?;
            out.error("late")?;
            out.complete()?;
            Ok(Cleanup::none())
        });
        let probe = Probe::new();
        source.subscribe(probe.sink()).unwrap();

        assert_eq!(
            probe.seen(),
            vec![Seen::Start, Seen::Data(1), Seen::End(None)]
        );
    }

    #[test]
    fn error_is_terminal() {
        let source = create_source(|out: Emitter<i32, &'static str>| {
            out.error("boom")?;
            out.next(1)?;
            Ok(Cleanup::none())
        });
        let probe = Probe::new();
        source.subscribe(probe.sink()).unwrap();

        assert_eq!(probe.seen(), vec![Seen::Start, Seen::End(Some("boom"))]);
    }

    #[test]
    fn cleanup_runs_once_on_sync_complete() {
        let (count, make) = counter();
        let source = create_source(move |out: Emitter<i32, &'static str>| {
            out.complete()?;
            Ok(make())
        });
        let probe = Probe::new();
        let talkback = source.subscribe(probe.sink()).unwrap();
        assert_eq!(count.get(), 1);

        talkback.cancel().unwrap();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn cleanup_runs_once_on_later_error() {
        let (count, make) = counter();
        let slot: Rc<RefCell<Option<Emitter<i32, &'static str>>>> = Rc::new(RefCell::new(None));
        let keep = Rc::clone(&slot);
        let source = create_source(move |out| {
            *keep.borrow_mut() = Some(out);
            Ok(make())
        });
        let probe = Probe::new();
        source.subscribe(probe.sink()).unwrap();
        assert_eq!(count.get(), 0);

        let out = slot.borrow().clone().unwrap();
        out.error("later").unwrap();
        out.complete().unwrap();
        probe.cancel().unwrap();

        assert_eq!(count.get(), 1);
        assert_eq!(probe.seen(), vec![Seen::Start, Seen::End(Some("later"))]);
    }

    #[test]
    fn cancel_right_after_start_runs_cleanup_once_and_sends_no_data() {
        let (count, make) = counter();
        let source = create_source(move |out: Emitter<i32, &'static str>| {
            out.next(1)?;
            Ok(make())
        });
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        source
            .subscribe(Sink::try_new(move |msg: Message<i32, &'static str>| {
                log.borrow_mut().push(msg.kind());
                match msg {
                    Message::Start(tb) => tb.cancel(),
                    _ => Ok(()),
                }
            }))
            .unwrap();

        assert_eq!(*seen.borrow(), vec![MessageKind::Start]);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn cancel_then_complete_race() {
        let (count, make) = counter();
        let slot: Rc<RefCell<Option<Emitter<i32, &'static str>>>> = Rc::new(RefCell::new(None));
        let keep = Rc::clone(&slot);
        let source = create_source(move |out| {
            *keep.borrow_mut() = Some(out);
            Ok(make())
        });
        let probe = Probe::new();
        let talkback = source.subscribe(probe.sink()).unwrap();
        let out = slot.borrow().clone().unwrap();

        talkback.cancel().unwrap();
        out.complete().unwrap();
        talkback.cancel().unwrap();

        assert_eq!(count.get(), 1);
        assert_eq!(probe.seen(), vec![Seen::Start]);
        assert!(out.is_terminated());
    }

    #[test]
    fn cleanup_error_propagates_from_cancel() {
        let source = create_source(|_out: Emitter<i32, &'static str>| {
            Ok(Cleanup::try_new(|| Err(RivuletError::cleanup("timer leaked"))))
        });
        let talkback = source.subscribe(Probe::new().sink()).unwrap();

        let err = talkback.cancel().unwrap_err();
        assert!(err.is_cleanup());
        // Second cancel is a no-op, not a second failure.
        talkback.cancel().unwrap();
    }

    #[test]
    fn cleanup_error_propagates_from_complete() {
        let slot: Rc<RefCell<Option<Emitter<i32, &'static str>>>> = Rc::new(RefCell::new(None));
        let keep = Rc::clone(&slot);
        let source = create_source(move |out| {
            *keep.borrow_mut() = Some(out);
            Ok(Cleanup::try_new(|| Err(RivuletError::cleanup("socket leaked"))))
        });
        let probe = Probe::new();
        source.subscribe(probe.sink()).unwrap();

        let out = slot.borrow().clone().unwrap();
        let err = out.complete().unwrap_err();
        assert!(err.is_cleanup());
        assert_eq!(probe.seen(), vec![Seen::Start, Seen::End(None)]);
    }

    #[test]
    fn cleanup_error_propagates_from_subscribe_when_already_complete() {
        let source = create_source(|out: Emitter<i32, &'static str>| {
            out.complete()?;
            Ok(Cleanup::try_new(|| Err(RivuletError::cleanup("late"))))
        });
        let err = source.subscribe(Probe::new().sink()).unwrap_err();
        assert!(err.is_cleanup());
    }

    #[test]
    fn producer_failure_surfaces_without_end() {
        let (count, make) = counter();
        let source = create_source(move |out: Emitter<i32, &'static str>| {
            out.add_cleanup(make())?;
            Err(RivuletError::producer("bad config"))
        });
        let probe = Probe::new();
        let err = source.subscribe(probe.sink()).unwrap_err();

        assert!(matches!(err, RivuletError::Producer(_)));
        assert_eq!(probe.seen(), vec![Seen::Start]);
        // Early-registered teardown is released, not leaked.
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn producer_failure_wins_over_failing_early_cleanup() {
        let before = crate::subscription::cleanup_failures_total();
        let (count, make) = counter();
        let source = create_source(move |out: Emitter<i32, &'static str>| {
            out.add_cleanup(Cleanup::try_new(|| Err(RivuletError::cleanup("half-open"))))?;
            out.add_cleanup(make())?;
            Err(RivuletError::producer("bad config"))
        });
        let err = source.subscribe(Probe::new().sink()).unwrap_err();

        assert!(matches!(err, RivuletError::Producer(_)));
        // The cleanup after the failing one still ran.
        assert_eq!(count.get(), 1);
        assert!(crate::subscription::cleanup_failures_total() > before);
    }

    #[test]
    fn sink_failure_on_start_skips_producer() {
        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        let source = create_source(move |_out: Emitter<i32, &'static str>| {
            flag.set(true);
            Ok(Cleanup::none())
        });
        let err = source
            .subscribe(Sink::try_new(|_msg: Message<i32, &'static str>| {
                Err(RivuletError::sink("not ready"))
            }))
            .unwrap_err();

        assert!(matches!(err, RivuletError::Sink(_)));
        assert!(!ran.get());
    }

    #[test]
    fn subscriptions_are_independent() {
        let source = create_source(|out: Emitter<i32, &'static str>| {
            let count = Cell::new(0);
            for _ in 0..3 {
                count.set(count.get() + 1);
                out.next(count.get())?;
            }
            out.complete()?;
            Ok(Cleanup::none())
        });
        let a = Probe::new();
        let b = Probe::new();
        let ta = source.subscribe(a.sink()).unwrap();
        let tb = source.subscribe(b.sink()).unwrap();

        let expected = vec![
            Seen::Start,
            Seen::Data(1),
            Seen::Data(2),
            Seen::Data(3),
            Seen::End(None),
        ];
        assert_eq!(a.seen(), expected);
        assert_eq!(b.seen(), expected);
        assert_ne!(ta.id(), tb.id());
    }

    #[test]
    fn cancelling_one_subscription_leaves_the_other_running() {
        let emitters: Rc<RefCell<Vec<Emitter<i32, &'static str>>>> = Rc::new(RefCell::new(Vec::new()));
        let keep = Rc::clone(&emitters);
        let source = create_source(move |out| {
            keep.borrow_mut().push(out);
            Ok(Cleanup::none())
        });
        let a = Probe::new();
        let b = Probe::new();
        source.subscribe(a.sink()).unwrap();
        source.subscribe(b.sink()).unwrap();

        a.cancel().unwrap();
        for out in emitters.borrow().iter() {
            out.next(7).unwrap();
        }

        assert_eq!(a.seen(), vec![Seen::Start]);
        assert_eq!(b.seen(), vec![Seen::Start, Seen::Data(7)]);
    }

    #[test]
    fn reentrant_emission_is_depth_first() {
        let slot: Rc<RefCell<Option<Emitter<i32, &'static str>>>> = Rc::new(RefCell::new(None));
        let keep = Rc::clone(&slot);
        let source = create_source(move |out: Emitter<i32, &'static str>| {
            *keep.borrow_mut() = Some(out.clone());
            out.next(1)?;
            out.next(2)?;
            Ok(Cleanup::none())
        });

        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let feedback = Rc::clone(&slot);
        source
            .subscribe(Sink::try_new(move |msg: Message<i32, &'static str>| {
                if let Message::Data(v) = msg {
                    log.borrow_mut().push(v);
                    if v == 1 {
                        let out = feedback.borrow().clone();
                        if let Some(out) = out {
                            out.next(10)?;
                            out.next(11)?;
                        }
                    }
                }
                Ok(())
            }))
            .unwrap();

        assert_eq!(*seen.borrow(), vec![1, 10, 11, 2]);
    }

    #[test]
    fn host_scheduled_emissions_keep_call_order() {
        let scheduler = Rc::new(ManualScheduler::new());
        let host = Rc::clone(&scheduler);
        let source = create_source(move |out: Emitter<i32, &'static str>| {
            out.next(4)?;
            let late = out.clone();
            host.schedule(
                Duration::from_millis(10),
                Box::new(move || late.next(2)),
            );
            let soon = out.clone();
            let nested_host = Rc::clone(&host);
            host.schedule(
                Duration::ZERO,
                Box::new(move || {
                    soon.next(3)?;
                    let inner = soon.clone();
                    nested_host.schedule(Duration::ZERO, Box::new(move || inner.next(1)));
                    Ok(())
                }),
            );
            Ok(Cleanup::none())
        });
        let probe = Probe::new();
        source.subscribe(probe.sink()).unwrap();
        scheduler.advance(Duration::from_millis(20)).unwrap();

        assert_eq!(
            probe.seen(),
            vec![
                Seen::Start,
                Seen::Data(4),
                Seen::Data(3),
                Seen::Data(1),
                Seen::Data(2)
            ]
        );
    }

    #[test]
    fn sink_error_propagates_to_producer_call() {
        let outcome = Rc::new(RefCell::new(None));
        let record = Rc::clone(&outcome);
        let source = create_source(move |out: Emitter<i32, &'static str>| {
            let result = out.next(1);
            *record.borrow_mut() = Some(result.is_err());
            Ok(Cleanup::none())
        });
        source
            .subscribe(Sink::try_new(|msg: Message<i32, &'static str>| match msg {
                Message::Data(_) => Err(RivuletError::sink("rejected")),
                _ => Ok(()),
            }))
            .unwrap();

        assert_eq!(*outcome.borrow(), Some(true));
    }

    #[test]
    fn emitter_talkback_ends_without_end_message() {
        let (count, make) = counter();
        let source = create_source(move |out: Emitter<i32, &'static str>| {
            out.add_cleanup(make())?;
            out.talkback().cancel()?;
            out.next(1)?;
            Ok(Cleanup::none())
        });
        let probe = Probe::new();
        let talkback = source.subscribe(probe.sink()).unwrap();

        assert!(talkback.is_terminated());
        assert_eq!(count.get(), 1);
        assert_eq!(probe.seen(), vec![Seen::Start]);
    }
}
