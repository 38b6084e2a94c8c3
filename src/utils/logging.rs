//! Structured logging setup.
//!
//! Thin wrapper over `tracing-subscriber`: an `EnvFilter` honoring
//! `RUST_LOG`, falling back to the configured level, with optional JSON
//! output for log shippers.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install the global subscriber. Safe to call once per process; later
/// calls are ignored (the first subscriber wins), which keeps tests that
/// each call `init` from panicking.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string().to_lowercase()));

    if config.json_format {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}

/// Install a plain INFO-level subscriber; convenience for examples/tests.
pub fn init_default() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}
