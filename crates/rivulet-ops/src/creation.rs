#![forbid(unsafe_code)]

//! Sources that are not derived from another source.
//!
//! Synchronous creators stop iterating as soon as their subscription is
//! terminated, so a downstream `take(n)` on an unbounded iterator finishes.
//! Time-based creators take the host [`Scheduler`] explicitly and cancel
//! their pending timer from cleanup.

use std::cell::Cell;
use std::rc::Rc;

use rivulet_core::{Cleanup, Emitter, Scheduler, Source, TimerId, create_source};
use web_time::Duration;

/// Emit each value, then complete.
pub fn of<T, E>(values: Vec<T>) -> Source<T, E>
where
    T: Clone + 'static,
    E: 'static,
{
    from_iter(values)
}

/// Emit every item of a fresh clone of `iter` per subscription, then complete.
pub fn from_iter<I, E>(iter: I) -> Source<I::Item, E>
where
    I: IntoIterator + Clone + 'static,
    I::Item: 'static,
    E: 'static,
{
    create_source(move |out: Emitter<I::Item, E>| {
        for item in iter.clone() {
            if out.is_terminated() {
                return Ok(Cleanup::none());
            }
            out.next(item)?;
        }
        out.complete()?;
        Ok(Cleanup::none())
    })
}

/// Complete immediately.
pub fn empty<T: 'static, E: 'static>() -> Source<T, E> {
    create_source(|out: Emitter<T, E>| {
        out.complete()?;
        Ok(Cleanup::none())
    })
}

/// Never emit and never end.
pub fn never<T: 'static, E: 'static>() -> Source<T, E> {
    create_source(|_out: Emitter<T, E>| Ok(Cleanup::none()))
}

/// Fail immediately with `err`.
pub fn fail<T, E>(err: E) -> Source<T, E>
where
    T: 'static,
    E: Clone + 'static,
{
    create_source(move |out: Emitter<T, E>| {
        out.error(err.clone())?;
        Ok(Cleanup::none())
    })
}

/// Emit `0` after `delay`, then complete.
pub fn timer<E: 'static>(scheduler: Rc<dyn Scheduler>, delay: Duration) -> Source<u64, E> {
    create_source(move |out: Emitter<u64, E>| {
        let fire = out.clone();
        let id = scheduler.schedule(
            delay,
            Box::new(move || {
                fire.next(0)?;
                fire.complete()
            }),
        );
        let scheduler = Rc::clone(&scheduler);
        Ok(Cleanup::new(move || {
            scheduler.cancel(id);
        }))
    })
}

/// Emit `0, 1, 2, …` every `period`. Never completes on its own.
pub fn interval<E: 'static>(scheduler: Rc<dyn Scheduler>, period: Duration) -> Source<u64, E> {
    create_source(move |out: Emitter<u64, E>| {
        let pending = Rc::new(Cell::new(None));
        schedule_tick(Rc::clone(&scheduler), out, period, 0, Rc::clone(&pending));
        let scheduler = Rc::clone(&scheduler);
        Ok(Cleanup::new(move || {
            if let Some(id) = pending.take() {
                scheduler.cancel(id);
            }
        }))
    })
}

fn schedule_tick<E: 'static>(
    scheduler: Rc<dyn Scheduler>,
    out: Emitter<u64, E>,
    period: Duration,
    tick: u64,
    pending: Rc<Cell<Option<TimerId>>>,
) {
    let host = Rc::clone(&scheduler);
    let slot = Rc::clone(&pending);
    let id = scheduler.schedule(
        period,
        Box::new(move || {
            if out.is_terminated() {
                return Ok(());
            }
            // Re-arm first so a cancellation triggered by this value also
            // cancels the next tick.
            schedule_tick(host, out.clone(), period, tick + 1, slot);
            out.next(tick)
        }),
    );
    pending.set(Some(id));
}
