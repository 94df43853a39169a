#![forbid(unsafe_code)]

//! Derived operators for rivulet.
//!
//! Every operator here is an ordinary [`create_source`](rivulet_core::create_source)
//! producer: it subscribes to its upstream sources from inside its own
//! producer, forwards or transforms what they deliver, and ties their
//! talkbacks to its own cleanup so that cancelling the result cancels every
//! upstream subscription it opened.
//!
//! | Module | Operators |
//! |---|---|
//! | [`creation`] | `of`, `from_iter`, `empty`, `never`, `fail`, `timer`, `interval` |
//! | [`transform`] | `map`, `filter`, `filter_map`, `scan`, `take`, `tap`, `distinct_until_changed` |
//! | [`error_boundary`] | `catch_error`, `error_boundary`, `retry` |
//! | [`subject`], [`multicast`], [`replay`] | `Subject`, `share`, `ReplaySubject`, `replay` |
//! | [`channel`] | `ValueChannel` |
//! | [`rate_limit`] | `throttle`, `debounce` |
//! | [`timeout`] | `timeout` |
//! | [`combine`] | `merge`, `switch_map` |
//!
//! [`SourceExt`] exposes the same operators as chainable methods.

mod relay;

pub mod channel;
pub mod combine;
pub mod creation;
pub mod error_boundary;
pub mod ext;
pub mod multicast;
pub mod rate_limit;
pub mod replay;
pub mod subject;
pub mod timeout;
pub mod transform;

pub use channel::ValueChannel;
pub use combine::{merge, switch_map};
pub use creation::{empty, fail, from_iter, interval, never, of, timer};
pub use error_boundary::{catch_error, error_boundary, retry};
pub use ext::SourceExt;
pub use multicast::share;
pub use rate_limit::{ThrottleConfig, debounce, throttle};
pub use replay::{ReplayConfig, ReplaySubject, replay};
pub use subject::Subject;
pub use timeout::{TimeoutConfig, timeout};
pub use transform::{distinct_until_changed, filter, filter_map, map, scan, take, tap};
