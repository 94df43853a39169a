#![forbid(unsafe_code)]

//! Current-value channel for UI state.
//!
//! A [`ValueChannel`] holds one value (configuration, progress, a result)
//! and exposes its changes as a [`Source`]. Subscribers receive the current
//! value immediately, then every change.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per mutation that changes the value.
//! 2. Setting a value equal to the current value is a no-op (no version bump,
//!    no notification).
//! 3. A subscriber never misses a change made while it receives the current
//!    value: it is attached before the current value is read.
//! 4. After [`ValueChannel::close`], mutations are ignored and subscribers
//!    receive the last value, then completion.

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::fmt;
use std::rc::Rc;

use rivulet_core::{Cleanup, Emitter, Result, Source, create_source};

use crate::relay::relay;
use crate::subject::Subject;

struct Inner<T> {
    value: RefCell<T>,
    version: Cell<u64>,
    changes: Subject<T, Infallible>,
}

pub struct ValueChannel<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Clone for ValueChannel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ValueChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueChannel")
            .field("value", &*self.inner.value.borrow())
            .field("version", &self.inner.version.get())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> ValueChannel<T> {
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            inner: Rc::new(Inner {
                value: RefCell::new(initial),
                version: Cell::new(0),
                changes: Subject::new(),
            }),
        }
    }

    #[must_use]
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value without cloning it.
    ///
    /// `f` must not call [`set`](Self::set) or [`update`](Self::update).
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Replace the value and notify subscribers, unless it is unchanged or
    /// the channel is closed.
    pub fn set(&self, value: T) -> Result<()> {
        if self.is_closed() || *self.inner.value.borrow() == value {
            return Ok(());
        }
        self.inner.value.replace(value.clone());
        self.inner.version.set(self.inner.version.get() + 1);
        self.inner.changes.next(value)
    }

    /// Derive the next value from the current one.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> Result<()> {
        let next = f(&self.inner.value.borrow());
        self.set(next)
    }

    /// Complete every subscriber; later mutations are ignored.
    pub fn close(&self) -> Result<()> {
        self.inner.changes.complete()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.changes.is_closed()
    }

    /// Current value, then every change.
    pub fn source(&self) -> Source<T, Infallible> {
        let inner = Rc::clone(&self.inner);
        create_source(move |out: Emitter<T, Infallible>| {
            if inner.changes.is_closed() {
                let last = inner.value.borrow().clone();
                out.next(last)?;
                out.complete()?;
                return Ok(Cleanup::none());
            }
            relay(&inner.changes.source(), &out, |out, value| out.next(value))?;
            let current = inner.value.borrow().clone();
            out.next(current)?;
            Ok(Cleanup::none())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivulet_harness::{Event, Recorder};

    #[test]
    fn set_notifies_and_bumps_version() {
        let channel = ValueChannel::new(1);
        let rec = Recorder::new();
        channel.source().subscribe(rec.sink()).unwrap();

        channel.set(2).unwrap();
        channel.set(3).unwrap();
        assert_eq!(rec.data(), vec![1, 2, 3]);
        assert_eq!(channel.version(), 2);
        assert_eq!(channel.get(), 3);
    }

    #[test]
    fn equal_set_is_noop() {
        let channel = ValueChannel::new("idle".to_string());
        let rec = Recorder::new();
        channel.source().subscribe(rec.sink()).unwrap();

        channel.set("idle".to_string()).unwrap();
        assert_eq!(channel.version(), 0);
        assert_eq!(rec.data(), vec!["idle".to_string()]);
    }

    #[test]
    fn update_derives_from_current() {
        let channel = ValueChannel::new(10u32);
        channel.update(|v| v * 2).unwrap();
        channel.update(|v| v + 1).unwrap();
        assert_eq!(channel.get(), 21);
        assert!(channel.with(|v| *v > 20));
    }

    #[test]
    fn each_subscriber_starts_from_current() {
        let channel = ValueChannel::new(0);
        channel.set(5).unwrap();
        let rec = Recorder::new();
        channel.source().subscribe(rec.sink()).unwrap();
        assert_eq!(rec.data(), vec![5]);
    }

    #[test]
    fn close_completes_and_freezes() {
        let channel = ValueChannel::new(1);
        let live = Recorder::new();
        channel.source().subscribe(live.sink()).unwrap();
        channel.close().unwrap();
        channel.set(2).unwrap();

        let late = Recorder::new();
        channel.source().subscribe(late.sink()).unwrap();

        assert_eq!(live.events(), vec![Event::Start, Event::Data(1), Event::End(None)]);
        assert_eq!(late.events(), vec![Event::Start, Event::Data(1), Event::End(None)]);
        assert_eq!(channel.get(), 1);
    }

    #[test]
    fn sink_setting_from_current_value_is_not_lost() {
        let channel = ValueChannel::new(0);
        let feedback = channel.clone();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        channel
            .source()
            .subscribe(rivulet_core::Sink::new(move |msg| {
                if let rivulet_core::Message::Data(v) = msg {
                    log.borrow_mut().push(v);
                    if v < 2 {
                        let _ = feedback.set(v + 1);
                    }
                }
            }))
            .unwrap();

        assert_eq!(*seen.borrow(), vec![0, 1, 2]);
        assert_eq!(channel.version(), 2);
    }
}
