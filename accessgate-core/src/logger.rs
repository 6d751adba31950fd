//! Structured logging initialization.
//!
//! Matches the teacher's `logger()` pattern: an `EnvFilter` defaulting to
//! `info`, ANSI colour gated on whether stdout is a terminal, file/line
//! disabled in the default format. Installed once at process startup.

use std::io::IsTerminal;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global `tracing` subscriber. Safe to call more than once;
/// subsequent calls are no-ops (errors from `try_init` are swallowed).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_ansi(std::io::stdout().is_terminal())
        .with_file(false)
        .with_line_number(false)
        .with_target(true)
        .try_init();
}
