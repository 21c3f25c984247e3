// src/logging.rs

//! Logging setup for `weave` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the filter:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `WEAVE_LOG` environment variable, either a plain level ("debug") or
//!    full directives ("info,weave::engine=trace")
//! 3. default to `info`
//!
//! Logs are sent to STDERR so that stdout carries only the reactor summary
//! and goal output.

use anyhow::{Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

const LOG_ENV: &str = "WEAVE_LOG";

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = match cli_level {
        Some(lvl) => EnvFilter::new(lvl.directive()),
        None => env_filter(std::env::var(LOG_ENV).ok().as_deref()),
    };

    // Worker thread names help here: steps of different projects interleave
    // on the pool.
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))
}

/// Filter from the `WEAVE_LOG` value; unparsable or empty values fall back
/// to `info`.
fn env_filter(value: Option<&str>) -> EnvFilter {
    value
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .map(|s| if s == "warning" { "warn".to_string() } else { s })
        .and_then(|s| EnvFilter::try_new(s).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}
