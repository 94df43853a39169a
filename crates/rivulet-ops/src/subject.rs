#![forbid(unsafe_code)]

//! Push-side hub that fans values out to every current subscriber.
//!
//! A [`Subject`] is both a way to push values imperatively and a
//! [`Source`] of them. Subscribers only see what is pushed after they
//! subscribe. Once ended, the subject delivers the same terminal
//! notification to late subscribers right after `START`.
//!
//! # Invariants
//!
//! 1. Delivery order is subscription order.
//! 2. A subscriber added while a value is being delivered does not receive
//!    that value.
//! 3. A subscriber cancelled while a value is being delivered receives
//!    nothing more, including the rest of that value's fan-out.

use std::cell::RefCell;
use std::convert::Infallible;
use std::fmt;
use std::rc::{Rc, Weak};

use rivulet_core::{Cleanup, Emitter, Result, Source, SubscriptionId, create_source};

struct Inner<T, E> {
    observers: RefCell<Vec<Emitter<T, E>>>,
    terminal: RefCell<Option<Option<E>>>,
}

pub struct Subject<T, E = Infallible> {
    inner: Rc<Inner<T, E>>,
}

impl<T, E> Clone for Subject<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Default for Subject<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for Subject<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subject")
            .field("observers", &self.inner.observers.borrow().len())
            .field("closed", &self.inner.terminal.borrow().is_some())
            .finish()
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Subject<T, E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(Inner {
                observers: RefCell::new(Vec::new()),
                terminal: RefCell::new(None),
            }),
        }
    }

    /// Deliver `value` to every current subscriber.
    ///
    /// A failing subscriber does not stop the fan-out; the first error is
    /// returned after everyone else has been served.
    pub fn next(&self, value: T) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        let snapshot = self.inner.observers.borrow().clone();
        let mut first_err = None;
        for observer in snapshot {
            if let Err(err) = observer.next(value.clone()) {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    pub fn complete(&self) -> Result<()> {
        self.close(None)
    }

    pub fn error(&self, err: E) -> Result<()> {
        self.close(Some(err))
    }

    pub(crate) fn close(&self, end: Option<E>) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        self.inner.terminal.replace(Some(end.clone()));
        let observers = self.inner.observers.take();
        let mut first_err = None;
        for observer in observers {
            let sent = match end.clone() {
                None => observer.complete(),
                Some(err) => observer.error(err),
            };
            if let Err(err) = sent {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Subscribe side of the subject.
    ///
    /// The returned source does not keep the subject alive. Subscribing after
    /// every `Subject` handle is gone completes immediately.
    pub fn source(&self) -> Source<T, E> {
        let weak = Rc::downgrade(&self.inner);
        create_source(move |out: Emitter<T, E>| {
            let Some(inner) = weak.upgrade() else {
                out.complete()?;
                return Ok(Cleanup::none());
            };
            let terminal = inner.terminal.borrow().clone();
            if let Some(end) = terminal {
                match end {
                    None => out.complete()?,
                    Some(err) => out.error(err)?,
                }
                return Ok(Cleanup::none());
            }
            let id = out.id();
            inner.observers.borrow_mut().push(out);
            Ok(detach(Rc::downgrade(&inner), id))
        })
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner.observers.borrow().len()
    }
}

impl<T, E> Subject<T, E> {
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.terminal.borrow().is_some()
    }
}

fn detach<T: 'static, E: 'static>(inner: Weak<Inner<T, E>>, id: SubscriptionId) -> Cleanup {
    Cleanup::new(move || {
        if let Some(inner) = inner.upgrade() {
            inner.observers.borrow_mut().retain(|o| o.id() != id);
        }
    })
}
