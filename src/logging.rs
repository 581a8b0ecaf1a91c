//! Diagnostic logging setup.
//!
//! Logs go to stderr so stdout stays clean for command output. The filter
//! defaults to `warn` and can be overridden with `RUST_LOG`
//! (e.g. `RUST_LOG=novel_muse=debug`).

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn";

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .ok();
}
