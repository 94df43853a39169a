#![forbid(unsafe_code)]

//! Logging shims.
//!
//! `log_trace!`, `log_debug!` and `log_warn!` forward to the `tracing` macros
//! when the `tracing` feature is enabled and expand to nothing otherwise, so
//! call sites never need their own `cfg` gates. Declared with `#[macro_use]`
//! ahead of every other module in `lib.rs`.

#[cfg(feature = "tracing")]
macro_rules! log_trace {
    ($($arg:tt)*) => { ::tracing::trace!($($arg)*) };
}

#[cfg(feature = "tracing")]
macro_rules! log_debug {
    ($($arg:tt)*) => { ::tracing::debug!($($arg)*) };
}

#[cfg(feature = "tracing")]
macro_rules! log_warn {
    ($($arg:tt)*) => { ::tracing::warn!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! log_trace {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
macro_rules! log_warn {
    ($($arg:tt)*) => {};
}
