#![forbid(unsafe_code)]

//! Test harness for rivulet.
//!
//! - [`Recorder`]: a sink that records every notification it receives and
//!   can dump them as JSONL for diffing.
//! - [`CleanupProbe`]: counts how many times the cleanups it hands out ran.
//! - [`init_test_logging`]: routes `tracing` output to the test writer,
//!   filtered by `RIVULET_LOG`.

pub mod logging;
pub mod probe;
pub mod recorder;

pub use logging::{LOG_ENV, init_test_logging};
pub use probe::CleanupProbe;
pub use recorder::{Event, Recorder};
