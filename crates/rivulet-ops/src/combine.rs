#![forbid(unsafe_code)]

//! Operators that juggle several upstream subscriptions at once.
//!
//! Both keep every inner subscription tied to the outer one: cancelling the
//! result cancels all of them, transitively.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rivulet_core::{
    Cleanup, Emitter, Message, Result, Sink, Source, SubscriptionId, Talkback, create_source,
};

use crate::relay::relay_with;

/// Interleave the values of all `sources` as they arrive.
///
/// Completes once every source has completed; fails on the first error,
/// cancelling the others. An empty list completes immediately.
pub fn merge<T, E>(sources: Vec<Source<T, E>>) -> Source<T, E>
where
    T: 'static,
    E: 'static,
{
    create_source(move |out: Emitter<T, E>| {
        if sources.is_empty() {
            out.complete()?;
            return Ok(Cleanup::none());
        }
        let active = Rc::new(Cell::new(sources.len()));
        for source in &sources {
            if out.is_terminated() {
                break;
            }
            let active = Rc::clone(&active);
            relay_with(
                source,
                &out,
                |out, value| out.next(value),
                move |out, end| match end {
                    Some(err) => out.error(err),
                    None => {
                        let left = active.get().saturating_sub(1);
                        active.set(left);
                        if left == 0 { out.complete() } else { Ok(()) }
                    }
                },
            )?;
        }
        Ok(Cleanup::none())
    })
}

struct Switch {
    current: RefCell<Option<Talkback>>,
    outer_done: Cell<bool>,
}

impl Switch {
    fn is_current(&self, id: SubscriptionId) -> bool {
        self.current.borrow().as_ref().is_some_and(|tb| tb.id() == id)
    }

    fn cancel_current(&self) -> Result<()> {
        let current = self.current.take();
        match current {
            Some(talkback) => talkback.cancel(),
            None => Ok(()),
        }
    }
}

/// Map each value to an inner source and follow only the latest one.
///
/// A new outer value cancels the previous inner subscription before the
/// next one starts. Completes when the outer source and the active inner
/// subscription have both completed; any error ends everything.
pub fn switch_map<T, U, E, F>(source: &Source<T, E>, f: F) -> Source<U, E>
where
    T: 'static,
    U: 'static,
    E: 'static,
    F: Fn(T) -> Source<U, E> + 'static,
{
    let source = source.clone();
    let f = Rc::new(f);
    create_source(move |out: Emitter<U, E>| {
        let switch = Rc::new(Switch {
            current: RefCell::new(None),
            outer_done: Cell::new(false),
        });
        let teardown = Rc::clone(&switch);
        out.add_cleanup(Cleanup::try_new(move || teardown.cancel_current()))?;

        let f = Rc::clone(&f);
        let on_value = Rc::clone(&switch);
        let on_end = Rc::clone(&switch);
        relay_with(
            &source,
            &out,
            move |out, value| {
                on_value.cancel_current()?;
                subscribe_inner(&on_value, &f(value), out)
            },
            move |out, end| match end {
                Some(err) => out.error(err),
                None => {
                    on_end.outer_done.set(true);
                    if on_end.current.borrow().is_none() {
                        out.complete()
                    } else {
                        Ok(())
                    }
                }
            },
        )?;
        Ok(Cleanup::none())
    })
}

fn subscribe_inner<U: 'static, E: 'static>(
    switch: &Rc<Switch>,
    inner: &Source<U, E>,
    out: &Emitter<U, E>,
) -> Result<()> {
    let switch = Rc::clone(switch);
    let out = out.clone();
    let own_id = Cell::new(None);
    inner.subscribe(Sink::try_new(move |msg| match msg {
        Message::Start(talkback) => {
            own_id.set(Some(talkback.id()));
            switch.current.replace(Some(talkback));
            Ok(())
        }
        Message::Data(value) => out.next(value),
        Message::End(end) => {
            let Some(id) = own_id.get() else {
                return Ok(());
            };
            if !switch.is_current(id) {
                return Ok(());
            }
            switch.current.take();
            match end {
                Some(err) => out.error(err),
                None if switch.outer_done.get() => out.complete(),
                None => Ok(()),
            }
        }
    }))?;
    Ok(())
}
