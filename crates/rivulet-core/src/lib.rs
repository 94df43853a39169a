#![forbid(unsafe_code)]

//! Core: the Source↔Sink handshake, the source factory, and the
//! cancellation/cleanup lifecycle every rivulet operator is built on.
//!
//! - [`create_source`] turns a producer function into a [`Source`].
//! - A [`Sink`] receives [`Message::Start`], then any number of
//!   [`Message::Data`], then at most one [`Message::End`].
//! - The [`Talkback`] delivered with `START` cancels the subscription.
//! - The producer's [`Cleanup`] runs exactly once, whichever side ends it.
//!
//! Everything is single-threaded (`Rc`, `Cell`, `RefCell`). Scheduling is left
//! to the host; see [`scheduler`] for the seam time-based operators use.

#[macro_use]
mod logging;

pub mod error;
pub mod protocol;
pub mod scheduler;
pub mod sink;
pub mod source;
pub mod subscription;
pub mod talkback;

pub use error::{BoxError, Result, RivuletError};
pub use protocol::{Message, MessageKind, Signal};
pub use scheduler::{ManualScheduler, Scheduler, Task, TimerId};
pub use sink::Sink;
pub use source::{Emitter, Source, create_source};
pub use subscription::{
    SubscriptionId, cancellations_total, cleanup_failures_total, subscriptions_total,
};
pub use talkback::{Cleanup, Talkback};
