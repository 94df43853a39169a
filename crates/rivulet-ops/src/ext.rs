#![forbid(unsafe_code)]

//! Method-chaining front end for the free-function operators.

use std::rc::Rc;

use rivulet_core::{Scheduler, Source};
use web_time::Duration;

use crate::{combine, error_boundary, multicast, rate_limit, replay, timeout, transform};
use crate::{ReplayConfig, ThrottleConfig, TimeoutConfig};

/// Operators as methods on [`Source`].
///
/// ```
/// use rivulet_ops::{SourceExt, of};
/// use rivulet_core::{Message, Sink};
/// use std::cell::RefCell;
/// use std::convert::Infallible;
/// use std::rc::Rc;
///
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let log = Rc::clone(&seen);
/// of::<_, Infallible>(vec![1, 2, 3, 4, 5])
///     .filter(|v| v % 2 == 1)
///     .map(|v| v * 10)
///     .take(2)
///     .subscribe(Sink::new(move |msg| {
///         if let Message::Data(v) = msg {
///             log.borrow_mut().push(v);
///         }
///     }))
///     .unwrap();
///
/// assert_eq!(*seen.borrow(), vec![10, 30]);
/// ```
pub trait SourceExt<T: 'static, E: 'static> {
    fn map<U, F>(&self, f: F) -> Source<U, E>
    where
        U: 'static,
        F: Fn(T) -> U + Clone + 'static;

    fn filter<P>(&self, keep: P) -> Source<T, E>
    where
        P: Fn(&T) -> bool + Clone + 'static;

    fn filter_map<U, F>(&self, f: F) -> Source<U, E>
    where
        U: 'static,
        F: Fn(T) -> Option<U> + Clone + 'static;

    fn scan<A, F>(&self, seed: A, step: F) -> Source<A, E>
    where
        A: Clone + 'static,
        F: Fn(&A, T) -> A + Clone + 'static;

    fn take(&self, count: usize) -> Source<T, E>;

    fn tap<F>(&self, inspect: F) -> Source<T, E>
    where
        F: Fn(&T) + Clone + 'static;

    fn distinct_until_changed(&self) -> Source<T, E>
    where
        T: Clone + PartialEq;

    fn catch_error<F, H>(&self, handler: H) -> Source<T, F>
    where
        F: 'static,
        H: Fn(E) -> Source<T, F> + 'static;

    fn error_boundary<F, R>(&self, report: R) -> Source<T, F>
    where
        F: 'static,
        R: Fn(E) + 'static;

    fn retry(&self, max_retries: usize) -> Source<T, E>;

    fn share(&self) -> Source<T, E>
    where
        T: Clone,
        E: Clone;

    fn replay(&self, config: ReplayConfig) -> Source<T, E>
    where
        T: Clone,
        E: Clone;

    fn throttle(&self, scheduler: Rc<dyn Scheduler>, config: ThrottleConfig) -> Source<T, E>;

    fn debounce(&self, scheduler: Rc<dyn Scheduler>, delay: Duration) -> Source<T, E>;

    fn timeout<M>(
        &self,
        scheduler: Rc<dyn Scheduler>,
        config: TimeoutConfig,
        make_error: M,
    ) -> Source<T, E>
    where
        M: Fn() -> E + 'static;

    fn merge_with(&self, other: &Source<T, E>) -> Source<T, E>;

    fn switch_map<U, F>(&self, f: F) -> Source<U, E>
    where
        U: 'static,
        F: Fn(T) -> Source<U, E> + 'static;
}

impl<T: 'static, E: 'static> SourceExt<T, E> for Source<T, E> {
    fn map<U, F>(&self, f: F) -> Source<U, E>
    where
        U: 'static,
        F: Fn(T) -> U + Clone + 'static,
    {
        transform::map(self, f)
    }

    fn filter<P>(&self, keep: P) -> Source<T, E>
    where
        P: Fn(&T) -> bool + Clone + 'static,
    {
        transform::filter(self, keep)
    }

    fn filter_map<U, F>(&self, f: F) -> Source<U, E>
    where
        U: 'static,
        F: Fn(T) -> Option<U> + Clone + 'static,
    {
        transform::filter_map(self, f)
    }

    fn scan<A, F>(&self, seed: A, step: F) -> Source<A, E>
    where
        A: Clone + 'static,
        F: Fn(&A, T) -> A + Clone + 'static,
    {
        transform::scan(self, seed, step)
    }

    fn take(&self, count: usize) -> Source<T, E> {
        transform::take(self, count)
    }

    fn tap<F>(&self, inspect: F) -> Source<T, E>
    where
        F: Fn(&T) + Clone + 'static,
    {
        transform::tap(self, inspect)
    }

    fn distinct_until_changed(&self) -> Source<T, E>
    where
        T: Clone + PartialEq,
    {
        transform::distinct_until_changed(self)
    }

    fn catch_error<F, H>(&self, handler: H) -> Source<T, F>
    where
        F: 'static,
        H: Fn(E) -> Source<T, F> + 'static,
    {
        error_boundary::catch_error(self, handler)
    }

    fn error_boundary<F, R>(&self, report: R) -> Source<T, F>
    where
        F: 'static,
        R: Fn(E) + 'static,
    {
        error_boundary::error_boundary(self, report)
    }

    fn retry(&self, max_retries: usize) -> Source<T, E> {
        error_boundary::retry(self, max_retries)
    }

    fn share(&self) -> Source<T, E>
    where
        T: Clone,
        E: Clone,
    {
        multicast::share(self)
    }

    fn replay(&self, config: ReplayConfig) -> Source<T, E>
    where
        T: Clone,
        E: Clone,
    {
        replay::replay(self, config)
    }

    fn throttle(&self, scheduler: Rc<dyn Scheduler>, config: ThrottleConfig) -> Source<T, E> {
        rate_limit::throttle(self, scheduler, config)
    }

    fn debounce(&self, scheduler: Rc<dyn Scheduler>, delay: Duration) -> Source<T, E> {
        rate_limit::debounce(self, scheduler, delay)
    }

    fn timeout<M>(
        &self,
        scheduler: Rc<dyn Scheduler>,
        config: TimeoutConfig,
        make_error: M,
    ) -> Source<T, E>
    where
        M: Fn() -> E + 'static,
    {
        timeout::timeout(self, scheduler, config, make_error)
    }

    fn merge_with(&self, other: &Source<T, E>) -> Source<T, E> {
        combine::merge(vec![self.clone(), other.clone()])
    }

    fn switch_map<U, F>(&self, f: F) -> Source<U, E>
    where
        U: 'static,
        F: Fn(T) -> Source<U, E> + 'static,
    {
        combine::switch_map(self, f)
    }
}
