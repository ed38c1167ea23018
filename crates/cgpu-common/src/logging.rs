use tracing_subscriber::{fmt, EnvFilter};

/// Name of the environment variable holding the log filter directive.
pub const LOG_ENV: &str = "CGPU_LOG";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize structured logging with environment filter.
/// Set CGPU_LOG=debug (or trace, info, warn, error) for verbosity control.
/// Panics if a global subscriber is already installed.
pub fn init_logging() {
    fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_thread_ids(true)
        .init();
}

/// Like [`init_logging`], but silently keeps an already installed subscriber.
/// Output goes through the test writer so `cargo test` captures it.
pub fn try_init_logging() {
    let _ = fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_test_writer()
        .try_init();
}
