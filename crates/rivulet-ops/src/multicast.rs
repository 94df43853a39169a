#![forbid(unsafe_code)]

//! Reference-counted sharing of one upstream subscription.
//!
//! [`share`] and [`replay`](crate::replay::replay) put a hub (a [`Subject`]
//! or a [`ReplaySubject`](crate::replay::ReplaySubject)) between one upstream
//! subscription and any number of downstream ones:
//!
//! - The first downstream subscriber connects upstream.
//! - Later subscribers attach to the hub and see what it delivers from then on.
//! - When the last downstream subscriber leaves, the upstream subscription is
//!   cancelled. A subscriber arriving after that connects afresh.
//!
//! `share` discards its hub on disconnect, so the next connection starts
//! from nothing. `replay` keeps it, so its buffer outlives disconnects; once
//! the upstream has ended, a kept hub is never reconnected.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use rivulet_core::{Cleanup, Emitter, Message, Result, Sink, Source, Talkback, create_source};

use crate::relay::relay;
use crate::subject::Subject;

/// Something a [`Connection`] can fan upstream notifications into.
pub(crate) trait Hub<T, E>: Clone + 'static {
    fn push(&self, value: T) -> Result<()>;
    fn close(&self, end: Option<E>) -> Result<()>;
    fn source(&self) -> Source<T, E>;
    fn is_closed(&self) -> bool;
}

impl<T: Clone + 'static, E: Clone + 'static> Hub<T, E> for Subject<T, E> {
    fn push(&self, value: T) -> Result<()> {
        self.next(value)
    }

    fn close(&self, end: Option<E>) -> Result<()> {
        Subject::close(self, end)
    }

    fn source(&self) -> Source<T, E> {
        Subject::source(self)
    }

    fn is_closed(&self) -> bool {
        Subject::is_closed(self)
    }
}

struct Connection<T, E, H> {
    upstream: Source<T, E>,
    make_hub: Box<dyn Fn() -> H>,
    keep_hub: bool,
    hub: RefCell<Option<H>>,
    link: RefCell<Option<Talkback>>,
    subscribers: Cell<usize>,
}

impl<T: 'static, E: 'static, H: Hub<T, E>> Connection<T, E, H> {
    fn hub(&self) -> H {
        let existing = self.hub.borrow().clone();
        if let Some(hub) = existing {
            return hub;
        }
        let hub = (self.make_hub)();
        self.hub.replace(Some(hub.clone()));
        hub
    }

    fn connect(self: &Rc<Self>) -> Result<()> {
        if self.link.borrow().is_some() {
            return Ok(());
        }
        let Some(hub) = self.hub.borrow().clone() else {
            return Ok(());
        };
        if hub.is_closed() {
            return Ok(());
        }
        tracing::debug!(
            message = "multicast.connect",
            subscribers = self.subscribers.get()
        );
        let weak: Weak<Self> = Rc::downgrade(self);
        self.upstream.subscribe(Sink::try_new(move |msg| match msg {
            Message::Start(talkback) => {
                if let Some(conn) = weak.upgrade() {
                    conn.link.replace(Some(talkback));
                }
                Ok(())
            }
            Message::Data(value) => hub.push(value),
            Message::End(end) => {
                if let Some(conn) = weak.upgrade() {
                    conn.link.take();
                }
                hub.close(end)
            }
        }))?;
        Ok(())
    }

    fn release(&self) -> Result<()> {
        let remaining = self.subscribers.get().saturating_sub(1);
        self.subscribers.set(remaining);
        if remaining > 0 {
            return Ok(());
        }
        if !self.keep_hub {
            self.hub.take();
        }
        match self.link.take() {
            Some(link) => {
                tracing::debug!(
                    message = "multicast.disconnect",
                    upstream = link.id().raw()
                );
                link.cancel()
            }
            None => Ok(()),
        }
    }
}

/// Build a source that multicasts `upstream` through hubs made by `make_hub`.
pub(crate) fn refcounted<T, E, H>(
    upstream: &Source<T, E>,
    make_hub: impl Fn() -> H + 'static,
    keep_hub: bool,
) -> Source<T, E>
where
    T: 'static,
    E: 'static,
    H: Hub<T, E>,
{
    let conn = Rc::new(Connection {
        upstream: upstream.clone(),
        make_hub: Box::new(make_hub),
        keep_hub,
        hub: RefCell::new(None),
        link: RefCell::new(None),
        subscribers: Cell::new(0),
    });
    create_source(move |out: Emitter<T, E>| {
        let hub = conn.hub();
        conn.subscribers.set(conn.subscribers.get() + 1);
        // Registered before joining the hub so a failed join still releases.
        let weak = Rc::downgrade(&conn);
        out.add_cleanup(Cleanup::try_new(move || match weak.upgrade() {
            Some(conn) => conn.release(),
            None => Ok(()),
        }))?;
        relay(&hub.source(), &out, |out, value| out.next(value))?;

        if !out.is_terminated() {
            conn.connect()?;
        }
        Ok(Cleanup::none())
    })
}

/// Share one upstream subscription among all current subscribers.
///
/// Late subscribers only see values emitted after they join.
pub fn share<T, E>(source: &Source<T, E>) -> Source<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    refcounted(source, Subject::<T, E>::new, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivulet_harness::{CleanupProbe, Event, Recorder};
    use std::convert::Infallible;

    type Driven = (
        Subject<i32, &'static str>,
        Source<i32, &'static str>,
        Rc<Cell<u32>>,
        CleanupProbe,
    );

    /// A cold source backed by a subject the test drives, counting how many
    /// times it is subscribed.
    fn driven() -> Driven {
        let subject = Subject::new();
        let subscriptions = Rc::new(Cell::new(0));
        let probe = CleanupProbe::new();
        let source = {
            let subject = subject.clone();
            let subscriptions = Rc::clone(&subscriptions);
            let probe = probe.clone();
            create_source(move |out: Emitter<i32, &'static str>| {
                subscriptions.set(subscriptions.get() + 1);
                relay(&subject.source(), &out, |out, v| out.next(v))?;
                Ok(probe.cleanup())
            })
        };
        (subject, source, subscriptions, probe)
    }

    #[test]
    fn one_upstream_for_many_subscribers() {
        let (subject, upstream, subscriptions, _) = driven();
        let shared = share(&upstream);
        let a = Recorder::new();
        let b = Recorder::new();
        shared.subscribe(a.sink()).unwrap();
        subject.next(1).unwrap();
        shared.subscribe(b.sink()).unwrap();
        subject.next(2).unwrap();

        assert_eq!(subscriptions.get(), 1);
        assert_eq!(a.data(), vec![1, 2]);
        assert_eq!(b.data(), vec![2]);
    }

    #[test]
    fn last_cancel_tears_upstream_down() {
        let (_subject, upstream, _, probe) = driven();
        let shared = share(&upstream);
        let a = Recorder::new();
        let b = Recorder::new();
        shared.subscribe(a.sink()).unwrap();
        shared.subscribe(b.sink()).unwrap();

        a.cancel().unwrap();
        assert_eq!(probe.count(), 0);
        b.cancel().unwrap();
        assert_eq!(probe.count(), 1);
    }

    #[test]
    fn resubscribing_after_disconnect_starts_fresh() {
        let (subject, upstream, subscriptions, _) = driven();
        let shared = share(&upstream);
        let first = Recorder::new();
        shared.subscribe(first.sink()).unwrap();
        first.cancel().unwrap();

        let second = Recorder::new();
        shared.subscribe(second.sink()).unwrap();
        subject.next(9).unwrap();

        assert_eq!(subscriptions.get(), 2);
        assert_eq!(second.data(), vec![9]);
    }

    #[test]
    fn upstream_end_reaches_everyone() {
        let (subject, upstream, _, probe) = driven();
        let shared = share(&upstream);
        let a = Recorder::new();
        let b = Recorder::new();
        shared.subscribe(a.sink()).unwrap();
        shared.subscribe(b.sink()).unwrap();
        subject.error("gone").unwrap();

        assert_eq!(a.events(), vec![Event::Start, Event::End(Some("gone"))]);
        assert_eq!(b.events(), vec![Event::Start, Event::End(Some("gone"))]);
        assert_eq!(probe.count(), 1);
    }

    #[test]
    fn synchronous_upstream_completes_each_connection() {
        let upstream = crate::creation::of::<_, Infallible>(vec![1, 2]);
        let shared = share(&upstream);
        let a = Recorder::new();
        let b = Recorder::new();
        shared.subscribe(a.sink()).unwrap();
        shared.subscribe(b.sink()).unwrap();

        assert_eq!(a.data(), vec![1, 2]);
        assert!(a.is_ended());
        assert_eq!(b.data(), vec![1, 2]);
        assert!(b.is_ended());
    }
}
