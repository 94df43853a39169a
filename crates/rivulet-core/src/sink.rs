#![forbid(unsafe_code)]

//! Consumer side of the handshake.

use std::fmt;
use std::rc::Rc;

use crate::error::Result;
use crate::protocol::Message;

type Handler<T, E> = Rc<dyn Fn(Message<T, E>) -> Result<()>>;

/// Receives the notifications of exactly one subscription.
///
/// The handler is `Fn`, not `FnMut`: a sink may be re-entered while it is
/// handling a message (a value it reacts to can make its producer emit
/// again). Keep mutable sink state in `Cell`/`RefCell` and never hold a
/// borrow across a call back into a source.
///
/// An error returned by the handler propagates out of the producer call that
/// delivered the message.
pub struct Sink<T, E> {
    handler: Handler<T, E>,
}

impl<T, E> Clone for Sink<T, E> {
    fn clone(&self) -> Self {
        Self {
            handler: Rc::clone(&self.handler),
        }
    }
}

impl<T: 'static, E: 'static> Sink<T, E> {
    pub fn new(handler: impl Fn(Message<T, E>) + 'static) -> Self {
        Self {
            handler: Rc::new(move |msg: Message<T, E>| -> Result<()> {
                handler(msg);
                Ok(())
            }),
        }
    }

    /// A sink whose handler can fail.
    pub fn try_new(handler: impl Fn(Message<T, E>) -> Result<()> + 'static) -> Self {
        Self {
            handler: Rc::new(handler),
        }
    }

    /// Deliver one message.
    #[inline]
    pub fn send(&self, msg: Message<T, E>) -> Result<()> {
        (self.handler)(msg)
    }
}

impl<T, E> fmt::Debug for Sink<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink").finish_non_exhaustive()
    }
}
