#![forbid(unsafe_code)]

//! Per-value transforms.
//!
//! Each operator opens exactly one upstream subscription per downstream
//! subscription and passes the terminal notification through unchanged,
//! except [`take`], which completes on its own once it has seen enough.

use std::cell::{Cell, RefCell};

use rivulet_core::{Cleanup, Emitter, Source, create_source};

use crate::relay::relay;

pub fn map<T, U, E, F>(source: &Source<T, E>, f: F) -> Source<U, E>
where
    T: 'static,
    U: 'static,
    E: 'static,
    F: Fn(T) -> U + Clone + 'static,
{
    let source = source.clone();
    create_source(move |out: Emitter<U, E>| {
        let f = f.clone();
        relay(&source, &out, move |out, value| out.next(f(value)))?;
        Ok(Cleanup::none())
    })
}

/// Keep the values for which `keep` returns `true`.
pub fn filter<T, E, P>(source: &Source<T, E>, keep: P) -> Source<T, E>
where
    T: 'static,
    E: 'static,
    P: Fn(&T) -> bool + Clone + 'static,
{
    let source = source.clone();
    create_source(move |out: Emitter<T, E>| {
        let keep = keep.clone();
        relay(&source, &out, move |out, value| {
            if keep(&value) { out.next(value) } else { Ok(()) }
        })?;
        Ok(Cleanup::none())
    })
}

pub fn filter_map<T, U, E, F>(source: &Source<T, E>, f: F) -> Source<U, E>
where
    T: 'static,
    U: 'static,
    E: 'static,
    F: Fn(T) -> Option<U> + Clone + 'static,
{
    let source = source.clone();
    create_source(move |out: Emitter<U, E>| {
        let f = f.clone();
        relay(&source, &out, move |out, value| match f(value) {
            Some(mapped) => out.next(mapped),
            None => Ok(()),
        })?;
        Ok(Cleanup::none())
    })
}

/// Running fold. Emits every intermediate accumulator; each subscription
/// starts again from `seed`.
pub fn scan<T, A, E, F>(source: &Source<T, E>, seed: A, step: F) -> Source<A, E>
where
    T: 'static,
    A: Clone + 'static,
    E: 'static,
    F: Fn(&A, T) -> A + Clone + 'static,
{
    let source = source.clone();
    create_source(move |out: Emitter<A, E>| {
        let acc = RefCell::new(seed.clone());
        let step = step.clone();
        relay(&source, &out, move |out, value| {
            let next = step(&acc.borrow(), value);
            acc.replace(next.clone());
            out.next(next)
        })?;
        Ok(Cleanup::none())
    })
}

/// Pass the first `count` values, then complete and cancel upstream.
///
/// `take(0)` completes without subscribing upstream at all.
pub fn take<T, E>(source: &Source<T, E>, count: usize) -> Source<T, E>
where
    T: 'static,
    E: 'static,
{
    let source = source.clone();
    create_source(move |out: Emitter<T, E>| {
        if count == 0 {
            out.complete()?;
            return Ok(Cleanup::none());
        }
        let seen = Cell::new(0usize);
        relay(&source, &out, move |out, value| {
            let n = seen.get() + 1;
            seen.set(n);
            out.next(value)?;
            if n == count { out.complete() } else { Ok(()) }
        })?;
        Ok(Cleanup::none())
    })
}

/// Run `inspect` on each value, then pass it through.
pub fn tap<T, E, F>(source: &Source<T, E>, inspect: F) -> Source<T, E>
where
    T: 'static,
    E: 'static,
    F: Fn(&T) + Clone + 'static,
{
    let source = source.clone();
    create_source(move |out: Emitter<T, E>| {
        let inspect = inspect.clone();
        relay(&source, &out, move |out, value| {
            inspect(&value);
            out.next(value)
        })?;
        Ok(Cleanup::none())
    })
}

/// Drop values equal to the one emitted just before.
pub fn distinct_until_changed<T, E>(source: &Source<T, E>) -> Source<T, E>
where
    T: Clone + PartialEq + 'static,
    E: 'static,
{
    let source = source.clone();
    create_source(move |out: Emitter<T, E>| {
        let last: RefCell<Option<T>> = RefCell::new(None);
        relay(&source, &out, move |out, value| {
            if last.borrow().as_ref() == Some(&value) {
                return Ok(());
            }
            last.replace(Some(value.clone()));
            out.next(value)
        })?;
        Ok(Cleanup::none())
    })
}
