#![forbid(unsafe_code)]

//! Upstream forwarding shared by every operator.

use rivulet_core::{Cleanup, Emitter, Message, Result, Sink, Source, Talkback};

/// Subscribe to `source` on behalf of `out`.
///
/// The upstream talkback is registered as one of `out`'s cleanups the moment
/// it arrives with `START`, so cancelling `out` cancels upstream even while
/// upstream is still emitting synchronously. Values go through `on_data`;
/// the terminal notification goes through `on_end`.
pub(crate) fn relay_with<T, U, E, F, D, X>(
    source: &Source<T, E>,
    out: &Emitter<U, F>,
    on_data: D,
    on_end: X,
) -> Result<Talkback>
where
    T: 'static,
    U: 'static,
    E: 'static,
    F: 'static,
    D: Fn(&Emitter<U, F>, T) -> Result<()> + 'static,
    X: Fn(&Emitter<U, F>, Option<E>) -> Result<()> + 'static,
{
    let out = out.clone();
    source.subscribe(Sink::try_new(move |msg| match msg {
        Message::Start(talkback) => out.add_cleanup(Cleanup::from(talkback)),
        Message::Data(value) => on_data(&out, value),
        Message::End(end) => on_end(&out, end),
    }))
}

/// [`relay_with`] that passes the terminal notification through unchanged.
pub(crate) fn relay<T, U, E, D>(
    source: &Source<T, E>,
    out: &Emitter<U, E>,
    on_data: D,
) -> Result<Talkback>
where
    T: 'static,
    U: 'static,
    E: 'static,
    D: Fn(&Emitter<U, E>, T) -> Result<()> + 'static,
{
    relay_with(source, out, on_data, forward_end)
}

pub(crate) fn forward_end<U: 'static, E: 'static>(
    out: &Emitter<U, E>,
    end: Option<E>,
) -> Result<()> {
    match end {
        None => out.complete(),
        Some(err) => out.error(err),
    }
}
