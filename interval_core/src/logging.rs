//! Logging setup shared by the `ivl` binary and tests.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging at INFO unless RUST_LOG says otherwise
pub fn init() {
    init_with_level("info")
}

/// Initialize logging with a specific default level
///
/// # Arguments
/// * `default_level` - Default log level (trace, debug, info, warn, error)
///
/// RUST_LOG still wins when it is set. Tick-level chatter is only visible
/// at `trace`.
pub fn init_with_level(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // try_init so a second call (e.g. from an embedding host) is harmless
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .try_init();
}

/// Initialize logging for testing (captures logs for test output)
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}
