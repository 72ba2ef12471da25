// src/logging.rs

//! Logging setup for `sciflow` using `tracing` + `tracing-subscriber`.
//!
//! The log filter is taken from the `SCIFLOW_LOG` environment variable
//! (e.g. "info", "debug", "sciflow=trace") and defaults to `info`.
//!
//! Logs are sent to STDERR so that stdout stays free for the output of the
//! shell commands a workflow runs.

use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable controlling the log filter.
pub const LOG_ENV_VAR: &str = "SCIFLOW_LOG";

/// Initialise the global logging subscriber.
///
/// Safe to call once at startup; embedding applications that install their
/// own subscriber should simply not call this.
pub fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
