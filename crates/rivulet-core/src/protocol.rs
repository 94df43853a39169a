#![forbid(unsafe_code)]

//! The Source↔Sink handshake.
//!
//! Three message kinds travel downstream, from a source to its sink:
//!
//! ```text
//!   START(talkback)  exactly once, before anything else
//!   DATA(value)      zero or more times
//!   END(error?)      at most once; `None` means successful completion
//! ```
//!
//! Upstream, the sink talks back through the [`Talkback`] it received with
//! `START`. Calling the source with a sink is itself the upstream `START`,
//! and the only upstream signal after that is [`Signal::End`] (cancel).
//! Pull-style "request next value" signalling is not modelled; delivery is
//! push-only.
//!
//! # Invariants
//!
//! 1. `START` precedes every `DATA`/`END` of the same subscription.
//! 2. After `END` crosses the boundary in either direction, nothing else
//!    crosses it. Late producer emissions are discarded silently.

use std::fmt;

use crate::talkback::Talkback;

/// A downstream notification.
pub enum Message<T, E> {
    /// Handshake; carries the cancellation handle for this subscription.
    Start(Talkback),
    /// One value.
    Data(T),
    /// Terminal notification. `None` is completion, `Some` is failure.
    End(Option<E>),
}

/// The tag of a [`Message`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Start,
    Data,
    End,
}

impl<T, E> Message<T, E> {
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Start(_) => MessageKind::Start,
            Self::Data(_) => MessageKind::Data,
            Self::End(_) => MessageKind::End,
        }
    }

    /// Whether this message ends the subscription.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End(_))
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Message<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start(talkback) => f.debug_tuple("Start").field(talkback).finish(),
            Self::Data(value) => f.debug_tuple("Data").field(value).finish(),
            Self::End(err) => f.debug_tuple("End").field(err).finish(),
        }
    }
}

/// An upstream signal sent by a sink through its [`Talkback`].
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Stop the subscription. No further `DATA`/`END` will be delivered.
    End,
}
