#![forbid(unsafe_code)]

//! Error boundaries.
//!
//! An upstream error is a value like any other until it reaches a boundary.
//! These operators decide what happens to it: switch to a fallback source,
//! report it and end quietly, or subscribe again.

use std::rc::Rc;

use rivulet_core::{Cleanup, Emitter, Result, Source, create_source};

use crate::relay::{forward_end, relay, relay_with};

/// On error, continue with the source `handler` builds from it.
///
/// Values already delivered stay delivered; the fallback's values follow
/// them and its terminal notification ends the subscription.
pub fn catch_error<T, E, F, H>(source: &Source<T, E>, handler: H) -> Source<T, F>
where
    T: 'static,
    E: 'static,
    F: 'static,
    H: Fn(E) -> Source<T, F> + 'static,
{
    let source = source.clone();
    let handler = Rc::new(handler);
    create_source(move |out: Emitter<T, F>| {
        let handler = Rc::clone(&handler);
        relay_with(
            &source,
            &out,
            |out, value| out.next(value),
            move |out, end| match end {
                None => out.complete(),
                Some(err) => {
                    let fallback = handler(err);
                    relay(&fallback, out, |out, value| out.next(value))?;
                    Ok(())
                }
            },
        )?;
        Ok(Cleanup::none())
    })
}

/// Hand any error to `report`, then complete normally.
///
/// The resulting source never fails, so its error type is free.
pub fn error_boundary<T, E, F, R>(source: &Source<T, E>, report: R) -> Source<T, F>
where
    T: 'static,
    E: 'static,
    F: 'static,
    R: Fn(E) + 'static,
{
    let source = source.clone();
    let report = Rc::new(report);
    create_source(move |out: Emitter<T, F>| {
        let report = Rc::clone(&report);
        relay_with(
            &source,
            &out,
            |out, value| out.next(value),
            move |out, end| {
                if let Some(err) = end {
                    tracing::warn!(
                        message = "error_boundary.caught",
                        subscription = out.id().raw()
                    );
                    report(err);
                }
                out.complete()
            },
        )?;
        Ok(Cleanup::none())
    })
}

/// Resubscribe to `source` after an error, at most `max_retries` times.
///
/// The last error is forwarded once retries are exhausted. Values from
/// failed attempts are not retracted.
pub fn retry<T, E>(source: &Source<T, E>, max_retries: usize) -> Source<T, E>
where
    T: 'static,
    E: 'static,
{
    let source = source.clone();
    create_source(move |out: Emitter<T, E>| {
        subscribe_attempt(&source, &out, max_retries)?;
        Ok(Cleanup::none())
    })
}

fn subscribe_attempt<T: 'static, E: 'static>(
    source: &Source<T, E>,
    out: &Emitter<T, E>,
    remaining: usize,
) -> Result<()> {
    let again = source.clone();
    relay_with(
        source,
        out,
        |out, value| out.next(value),
        move |out, end| match end {
            Some(_) if remaining > 0 => {
                tracing::debug!(message = "retry.resubscribe", remaining);
                subscribe_attempt(&again, out, remaining - 1)
            }
            end => forward_end(out, end),
        },
    )?;
    Ok(())
}
