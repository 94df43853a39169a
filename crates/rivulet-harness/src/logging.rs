#![forbid(unsafe_code)]

//! Test logging setup.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the filter directives, e.g.
/// `RIVULET_LOG=rivulet_ops=debug`.
pub const LOG_ENV: &str = "RIVULET_LOG";

const DEFAULT_DIRECTIVES: &str = "warn";

/// Install a compact `fmt` subscriber writing to the test output.
///
/// Safe to call from every test: only the first call installs anything.
pub fn init_test_logging() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .with_target(true)
        .compact()
        .try_init();
    if installed.is_ok() {
        tracing::debug!(message = "harness.logging_ready", env = LOG_ENV);
    }
}
