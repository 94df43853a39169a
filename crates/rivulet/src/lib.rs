#![forbid(unsafe_code)]

//! rivulet public facade crate.
//!
//! Re-exports the core primitive and, with the default `ops` feature, the
//! derived operators.
//!
//! ```
//! use rivulet::prelude::*;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let progress = ValueChannel::new(0u8);
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let log = Rc::clone(&seen);
//!
//! progress
//!     .source()
//!     .distinct_until_changed()
//!     .subscribe(Sink::new(move |msg| {
//!         if let Message::Data(pct) = msg {
//!             log.borrow_mut().push(pct);
//!         }
//!     }))
//!     .unwrap();
//!
//! progress.set(50).unwrap();
//! progress.set(50).unwrap();
//! progress.set(100).unwrap();
//! assert_eq!(*seen.borrow(), vec![0, 50, 100]);
//! ```

pub use rivulet_core as core;
#[cfg(feature = "ops")]
pub use rivulet_ops as ops;

pub use rivulet_core::{
    Cleanup, Emitter, Message, Result, RivuletError, Scheduler, Signal, Sink, Source, Talkback,
    create_source,
};

pub mod prelude {
    pub use rivulet_core::{
        Cleanup, Emitter, ManualScheduler, Message, Result, RivuletError, Scheduler, Signal, Sink,
        Source, Talkback, create_source,
    };

    #[cfg(feature = "ops")]
    pub use rivulet_ops::{
        ReplayConfig, ReplaySubject, SourceExt, Subject, ThrottleConfig, TimeoutConfig,
        ValueChannel, empty, fail, from_iter, interval, merge, never, of, timer,
    };
}
