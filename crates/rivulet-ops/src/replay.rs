#![forbid(unsafe_code)]

//! Replaying hub.
//!
//! A [`ReplaySubject`] remembers the most recent values (all of them, or
//! the last `capacity`) and the terminal notification. A new subscriber
//! first receives the buffer in order, then follows live values.
//!
//! Values pushed while a subscriber is still catching up (for example by a
//! sink reacting to a replayed value) land in the buffer and are delivered
//! to it in order, exactly once.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::fmt;
use std::rc::Rc;

use rivulet_core::{Cleanup, Emitter, Result, Source, create_source};

use crate::multicast::{Hub, refcounted};
use crate::relay::relay;
use crate::subject::Subject;

/// Buffer sizing for [`ReplaySubject`] and [`replay`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplayConfig {
    /// Maximum number of values kept. `None` keeps everything.
    pub capacity: Option<usize>,
}

impl ReplayConfig {
    #[must_use]
    pub const fn unbounded() -> Self {
        Self { capacity: None }
    }

    /// Keep only the last `capacity` values.
    #[must_use]
    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }
}

struct Inner<T, E> {
    capacity: Option<usize>,
    buffer: RefCell<VecDeque<T>>,
    /// Values dropped from the front so far; the absolute position of
    /// `buffer[0]`.
    evicted: Cell<u64>,
    live: Subject<T, E>,
}

pub struct ReplaySubject<T, E = Infallible> {
    inner: Rc<Inner<T, E>>,
}

impl<T, E> Clone for ReplaySubject<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Default for ReplaySubject<T, E> {
    fn default() -> Self {
        Self::new(ReplayConfig::default())
    }
}

impl<T, E> fmt::Debug for ReplaySubject<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplaySubject")
            .field("capacity", &self.inner.capacity)
            .field("buffered", &self.inner.buffer.borrow().len())
            .field("evicted", &self.inner.evicted.get())
            .field("closed", &self.inner.live.is_closed())
            .finish()
    }
}

impl<T: Clone + 'static, E: Clone + 'static> ReplaySubject<T, E> {
    #[must_use]
    pub fn new(config: ReplayConfig) -> Self {
        Self {
            inner: Rc::new(Inner {
                capacity: config.capacity,
                buffer: RefCell::new(VecDeque::new()),
                evicted: Cell::new(0),
                live: Subject::new(),
            }),
        }
    }

    /// Record `value` and deliver it to current subscribers.
    pub fn next(&self, value: T) -> Result<()> {
        if self.inner.live.is_closed() {
            return Ok(());
        }
        self.remember(value.clone());
        self.inner.live.next(value)
    }

    pub fn complete(&self) -> Result<()> {
        self.inner.live.close(None)
    }

    pub fn error(&self, err: E) -> Result<()> {
        self.inner.live.close(Some(err))
    }

    fn remember(&self, value: T) {
        let inner = &self.inner;
        let mut buffer = inner.buffer.borrow_mut();
        if inner.capacity == Some(0) {
            inner.evicted.set(inner.evicted.get() + 1);
            return;
        }
        buffer.push_back(value);
        if let Some(cap) = inner.capacity {
            while buffer.len() > cap {
                buffer.pop_front();
                inner.evicted.set(inner.evicted.get() + 1);
            }
        }
    }

    /// Currently buffered values, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.inner.buffer.borrow().iter().cloned().collect()
    }

    /// Replay the buffer, then follow live values and the terminal.
    pub fn source(&self) -> Source<T, E> {
        let inner = Rc::clone(&self.inner);
        create_source(move |out: Emitter<T, E>| {
            let mut cursor = inner.evicted.get();
            loop {
                if out.is_terminated() {
                    return Ok(Cleanup::none());
                }
                // Re-read on every step: delivering a value may push more.
                let value = {
                    let buffer = inner.buffer.borrow();
                    let first = inner.evicted.get();
                    cursor = cursor.max(first);
                    usize::try_from(cursor - first)
                        .ok()
                        .and_then(|index| buffer.get(index).cloned())
                };
                match value {
                    Some(value) => {
                        cursor += 1;
                        out.next(value)?;
                    }
                    None => break,
                }
            }
            relay(&inner.live.source(), &out, |out, value| out.next(value))?;
            Ok(Cleanup::none())
        })
    }
}

impl<T, E> ReplaySubject<T, E> {
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.live.is_closed()
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Hub<T, E> for ReplaySubject<T, E> {
    fn push(&self, value: T) -> Result<()> {
        self.next(value)
    }

    fn close(&self, end: Option<E>) -> Result<()> {
        self.inner.live.close(end)
    }

    fn source(&self) -> Source<T, E> {
        ReplaySubject::source(self)
    }

    fn is_closed(&self) -> bool {
        ReplaySubject::is_closed(self)
    }
}

/// Share `source` like [`share`](crate::multicast::share), replaying
/// buffered values to every subscriber.
///
/// The buffer survives disconnects: a subscriber arriving after everyone
/// left still receives it, then triggers a fresh upstream subscription
/// unless upstream had already ended.
pub fn replay<T, E>(source: &Source<T, E>, config: ReplayConfig) -> Source<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    refcounted(source, move || ReplaySubject::<T, E>::new(config), true)
}
