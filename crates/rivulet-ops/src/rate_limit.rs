#![forbid(unsafe_code)]

//! Time-based rate limiting: [`throttle`] and [`debounce`].
//!
//! Both hold at most one pending value and one timer per subscription. The
//! timer is cancelled from cleanup, so a cancelled subscription leaves
//! nothing queued on the host scheduler.
//!
//! # Failure Modes
//!
//! - **Upstream completes with a pending value**: the value is flushed,
//!   then completion is forwarded.
//! - **Upstream fails with a pending value**: the value is dropped and the
//!   error is forwarded at once.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rivulet_core::{Cleanup, Emitter, Result, Scheduler, Source, TimerId, create_source};
use web_time::Duration;

use crate::relay::relay_with;

/// Configuration for [`throttle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// Minimum spacing between two emitted values.
    /// Default: 100ms.
    pub interval: Duration,

    /// Emit the value that opens a window immediately.
    /// Default: true.
    pub leading: bool,

    /// Emit the latest value suppressed during a window when it closes.
    /// Default: false.
    pub trailing: bool,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            leading: true,
            trailing: false,
        }
    }
}

impl ThrottleConfig {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_leading(mut self, leading: bool) -> Self {
        self.leading = leading;
        self
    }

    #[must_use]
    pub fn with_trailing(mut self, trailing: bool) -> Self {
        self.trailing = trailing;
        self
    }
}

struct Throttle<T, E> {
    out: Emitter<T, E>,
    scheduler: Rc<dyn Scheduler>,
    config: ThrottleConfig,
    window: Cell<Option<TimerId>>,
    pending: RefCell<Option<T>>,
}

impl<T: 'static, E: 'static> Throttle<T, E> {
    fn on_value(self: &Rc<Self>, value: T) -> Result<()> {
        if self.window.get().is_some() {
            if self.config.trailing {
                self.pending.replace(Some(value));
            }
            return Ok(());
        }
        self.open_window();
        if self.config.leading {
            self.out.next(value)
        } else {
            if self.config.trailing {
                self.pending.replace(Some(value));
            }
            Ok(())
        }
    }

    fn open_window(self: &Rc<Self>) {
        let weak = Rc::downgrade(self);
        let id = self.scheduler.schedule(
            self.config.interval,
            Box::new(move || match weak.upgrade() {
                Some(throttle) => throttle.close_window(),
                None => Ok(()),
            }),
        );
        self.window.set(Some(id));
    }

    fn close_window(self: &Rc<Self>) -> Result<()> {
        self.window.set(None);
        let Some(value) = self.pending.take() else {
            return Ok(());
        };
        // The trailing value starts the next window.
        self.open_window();
        self.out.next(value)
    }

    fn on_end(&self, end: Option<E>) -> Result<()> {
        self.cancel_window();
        match end {
            None => {
                if let Some(value) = self.pending.take() {
                    self.out.next(value)?;
                }
                self.out.complete()
            }
            Some(err) => {
                self.pending.take();
                self.out.error(err)
            }
        }
    }

    fn cancel_window(&self) {
        if let Some(id) = self.window.take() {
            self.scheduler.cancel(id);
        }
    }
}

/// Emit at most one value per `config.interval`.
///
/// With both `leading` and `trailing` off nothing is ever emitted.
pub fn throttle<T, E>(
    source: &Source<T, E>,
    scheduler: Rc<dyn Scheduler>,
    config: ThrottleConfig,
) -> Source<T, E>
where
    T: 'static,
    E: 'static,
{
    let source = source.clone();
    create_source(move |out: Emitter<T, E>| {
        let state = Rc::new(Throttle {
            out: out.clone(),
            scheduler: Rc::clone(&scheduler),
            config,
            window: Cell::new(None),
            pending: RefCell::new(None),
        });
        let data = Rc::clone(&state);
        let end = Rc::clone(&state);
        relay_with(
            &source,
            &out,
            move |_, value| data.on_value(value),
            move |_, terminal| end.on_end(terminal),
        )?;
        Ok(Cleanup::new(move || state.cancel_window()))
    })
}

struct Debounce<T, E> {
    out: Emitter<T, E>,
    scheduler: Rc<dyn Scheduler>,
    delay: Duration,
    timer: Cell<Option<TimerId>>,
    pending: RefCell<Option<T>>,
}

impl<T: 'static, E: 'static> Debounce<T, E> {
    fn on_value(self: &Rc<Self>, value: T) {
        self.cancel_timer();
        self.pending.replace(Some(value));
        let weak = Rc::downgrade(self);
        let id = self.scheduler.schedule(
            self.delay,
            Box::new(move || match weak.upgrade() {
                Some(debounce) => debounce.fire(),
                None => Ok(()),
            }),
        );
        self.timer.set(Some(id));
    }

    fn fire(&self) -> Result<()> {
        self.timer.set(None);
        match self.pending.take() {
            Some(value) => self.out.next(value),
            None => Ok(()),
        }
    }

    fn on_end(&self, end: Option<E>) -> Result<()> {
        self.cancel_timer();
        match end {
            None => {
                if let Some(value) = self.pending.take() {
                    self.out.next(value)?;
                }
                self.out.complete()
            }
            Some(err) => {
                self.pending.take();
                self.out.error(err)
            }
        }
    }

    fn cancel_timer(&self) {
        if let Some(id) = self.timer.take() {
            self.scheduler.cancel(id);
        }
    }
}

/// Emit a value only after `delay` has passed without a newer one.
pub fn debounce<T, E>(
    source: &Source<T, E>,
    scheduler: Rc<dyn Scheduler>,
    delay: Duration,
) -> Source<T, E>
where
    T: 'static,
    E: 'static,
{
    let source = source.clone();
    create_source(move |out: Emitter<T, E>| {
        let state = Rc::new(Debounce {
            out: out.clone(),
            scheduler: Rc::clone(&scheduler),
            delay,
            timer: Cell::new(None),
            pending: RefCell::new(None),
        });
        let data = Rc::clone(&state);
        let end = Rc::clone(&state);
        relay_with(
            &source,
            &out,
            move |_, value| {
                data.on_value(value);
                Ok(())
            },
            move |_, terminal| end.on_end(terminal),
        )?;
        Ok(Cleanup::new(move || state.cancel_timer()))
    })
}
