//! Log output for the host process
//!
//! The shim links its own copy of `tracing`, so a subscriber the host application installed
//! never sees the shim's events. The shim installs a compact `fmt` subscriber writing to stderr
//! on first use.

use tracing_subscriber::EnvFilter;

use crate::config::DEFAULT_LOG_FILTER;

/// Installs the stderr subscriber with the given filter directives
///
/// Invalid directives fall back to [`DEFAULT_LOG_FILTER`]. Returns whether the subscriber was
/// installed, `false` if one was already set in this copy of `tracing`, as happens when the
/// library is also linked into a test binary.
pub fn init_logging(directives: &str) -> bool {
    let env_filter =
        EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .try_init()
        .is_ok()
}
