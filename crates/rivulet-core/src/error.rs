#![forbid(unsafe_code)]

//! Errors raised by the primitive itself.
//!
//! Stream errors (the payload of a terminal `End`) are a caller-chosen generic
//! and never appear here. [`RivuletError`] only covers failures of the
//! machinery around a subscription: a producer that fails before returning,
//! a cleanup that fails while tearing down, and a sink that rejects a
//! notification.

use thiserror::Error;

/// Boxed error used as the payload of every [`RivuletError`] variant.
pub type BoxError = Box<dyn std::error::Error + 'static>;

pub type Result<T> = std::result::Result<T, RivuletError>;

#[derive(Debug, Error)]
pub enum RivuletError {
    /// The producer failed synchronously while the source was being subscribed.
    #[error("producer failed: {0}")]
    Producer(#[source] BoxError),

    /// A cleanup function failed while its subscription was ending.
    #[error("cleanup failed: {0}")]
    Cleanup(#[source] BoxError),

    /// A sink refused a notification.
    #[error("sink failed: {0}")]
    Sink(#[source] BoxError),
}

impl RivuletError {
    #[must_use]
    pub fn producer(err: impl Into<BoxError>) -> Self {
        Self::Producer(err.into())
    }

    #[must_use]
    pub fn cleanup(err: impl Into<BoxError>) -> Self {
        Self::Cleanup(err.into())
    }

    #[must_use]
    pub fn sink(err: impl Into<BoxError>) -> Self {
        Self::Sink(err.into())
    }

    /// Whether this error came out of a cleanup function.
    #[must_use]
    pub fn is_cleanup(&self) -> bool {
        matches!(self, Self::Cleanup(_))
    }
}
