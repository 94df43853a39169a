#![forbid(unsafe_code)]

//! Deadline on a source.
//!
//! [`timeout`] races a timer against the wrapped source. If the source ends
//! first the timer is cancelled; if the timer fires first the upstream
//! subscription is cancelled and the subscriber receives the error built by
//! `make_error`.

use std::cell::Cell;
use std::rc::Rc;

use rivulet_core::{Cleanup, Emitter, Result, Scheduler, Source, TimerId, create_source};
use web_time::Duration;

use crate::relay::{forward_end, relay_with};

/// Configuration for [`timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// How long the source may run (or stay idle, see `reset_on_data`).
    /// Default: 1s.
    pub duration: Duration,

    /// Restart the deadline on every value, turning it into an idle timeout.
    /// Default: false.
    pub reset_on_data: bool,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(1),
            reset_on_data: false,
        }
    }
}

impl TimeoutConfig {
    #[must_use]
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_reset_on_data(mut self, reset: bool) -> Self {
        self.reset_on_data = reset;
        self
    }
}

struct Deadline<T, E> {
    out: Emitter<T, E>,
    scheduler: Rc<dyn Scheduler>,
    duration: Duration,
    timer: Cell<Option<TimerId>>,
    make_error: Rc<dyn Fn() -> E>,
}

impl<T: 'static, E: 'static> Deadline<T, E> {
    fn arm(self: &Rc<Self>) {
        self.disarm();
        let weak = Rc::downgrade(self);
        let id = self.scheduler.schedule(
            self.duration,
            Box::new(move || match weak.upgrade() {
                Some(deadline) => deadline.expire(),
                None => Ok(()),
            }),
        );
        self.timer.set(Some(id));
    }

    fn disarm(&self) {
        if let Some(id) = self.timer.take() {
            self.scheduler.cancel(id);
        }
    }

    fn expire(&self) -> Result<()> {
        self.timer.set(None);
        if self.out.is_terminated() {
            return Ok(());
        }
        tracing::debug!(
            message = "timeout.expired",
            subscription = self.out.id().raw(),
            after = ?self.duration
        );
        self.out.error((self.make_error)())
    }
}

/// Fail with `make_error()` unless `source` ends within `config.duration`.
pub fn timeout<T, E, M>(
    source: &Source<T, E>,
    scheduler: Rc<dyn Scheduler>,
    config: TimeoutConfig,
    make_error: M,
) -> Source<T, E>
where
    T: 'static,
    E: 'static,
    M: Fn() -> E + 'static,
{
    let source = source.clone();
    let make_error: Rc<dyn Fn() -> E> = Rc::new(make_error);
    create_source(move |out: Emitter<T, E>| {
        let deadline = Rc::new(Deadline {
            out: out.clone(),
            scheduler: Rc::clone(&scheduler),
            duration: config.duration,
            timer: Cell::new(None),
            make_error: Rc::clone(&make_error),
        });
        deadline.arm();
        let disarm = Rc::clone(&deadline);
        out.add_cleanup(Cleanup::new(move || disarm.disarm()))?;

        let data = Rc::clone(&deadline);
        let end = Rc::clone(&deadline);
        relay_with(
            &source,
            &out,
            move |out, value| {
                if config.reset_on_data {
                    data.arm();
                }
                out.next(value)
            },
            move |out, terminal| {
                end.disarm();
                forward_end(out, terminal)
            },
        )?;
        Ok(Cleanup::none())
    })
}
