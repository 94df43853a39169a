#![forbid(unsafe_code)]

//! Recording sink.
//!
//! A [`Recorder`] is meant for exactly one subscription. It keeps every
//! notification in arrival order, remembers the talkback it was handed with
//! `START`, and can cancel its own subscription after a fixed number of
//! values (the way a `take(n)` consumer would, from inside the delivery).

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use rivulet_core::{Message, Result, Sink, Source, Talkback};
use serde::Serialize;

/// One recorded notification, without the talkback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Event<T, E> {
    Start,
    Data(T),
    End(Option<E>),
}

struct Inner<T, E> {
    events: RefCell<Vec<Event<T, E>>>,
    talkback: RefCell<Option<Talkback>>,
    cancel_after: Option<usize>,
    values: Cell<usize>,
}

pub struct Recorder<T, E> {
    inner: Rc<Inner<T, E>>,
}

impl<T, E> Clone for Recorder<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Recorder<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recorder")
            .field("events", &*self.inner.events.borrow())
            .field("cancel_after", &self.inner.cancel_after)
            .finish()
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Default for Recorder<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Recorder<T, E> {
    #[must_use]
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Cancel the subscription from inside the delivery of the `count`-th value.
    #[must_use]
    pub fn cancelling_after(count: usize) -> Self {
        Self::build(Some(count))
    }

    fn build(cancel_after: Option<usize>) -> Self {
        Self {
            inner: Rc::new(Inner {
                events: RefCell::new(Vec::new()),
                talkback: RefCell::new(None),
                cancel_after,
                values: Cell::new(0),
            }),
        }
    }

    /// The sink to subscribe with.
    pub fn sink(&self) -> Sink<T, E> {
        let inner = Rc::clone(&self.inner);
        Sink::try_new(move |msg: Message<T, E>| {
            match msg {
                Message::Start(talkback) => {
                    inner.talkback.replace(Some(talkback));
                    inner.events.borrow_mut().push(Event::Start);
                }
                Message::Data(value) => {
                    inner.events.borrow_mut().push(Event::Data(value));
                    let seen = inner.values.get() + 1;
                    inner.values.set(seen);
                    if inner.cancel_after == Some(seen) {
                        let talkback = inner.talkback.borrow().clone();
                        if let Some(talkback) = talkback {
                            talkback.cancel()?;
                        }
                    }
                }
                Message::End(end) => inner.events.borrow_mut().push(Event::End(end)),
            }
            Ok(())
        })
    }

    /// Subscribe this recorder to `source`.
    pub fn subscribe_to(&self, source: &Source<T, E>) -> Result<Talkback> {
        source.subscribe(self.sink())
    }

    #[must_use]
    pub fn events(&self) -> Vec<Event<T, E>> {
        self.inner.events.borrow().clone()
    }

    /// Just the values, in order.
    #[must_use]
    pub fn data(&self) -> Vec<T> {
        self.inner
            .events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Event::Data(value) => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    /// Whether an `END` was received.
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.inner
            .events
            .borrow()
            .iter()
            .any(|event| matches!(event, Event::End(_)))
    }

    #[must_use]
    pub fn talkback(&self) -> Option<Talkback> {
        self.inner.talkback.borrow().clone()
    }

    /// Cancel the recorded subscription. A no-op before `START`.
    pub fn cancel(&self) -> Result<()> {
        match self.talkback() {
            Some(talkback) => talkback.cancel(),
            None => Ok(()),
        }
    }
}

impl<T: Serialize, E: Serialize> Recorder<T, E> {
    /// One JSON object per recorded event, newline-terminated.
    pub fn to_jsonl(&self) -> serde_json::Result<String> {
        let mut out = String::new();
        for event in self.inner.events.borrow().iter() {
            out.push_str(&serde_json::to_string(event)?);
            out.push('\n');
        }
        Ok(out)
    }
}
