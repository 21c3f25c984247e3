// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{ArgGroup, Parser, ValueEnum};

use crate::types::FailureBehaviour;

/// Command-line arguments for `weave`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "weave",
    version,
    about = "Build a multi-project reactor by weaving lifecycle phases across projects.",
    long_about = None
)]
#[command(group(
    ArgGroup::new("failure")
        .args(["fail_fast", "fail_at_end", "fail_never"])
        .multiple(false)
))]
pub struct CliArgs {
    /// Lifecycle phases and/or goals to run (e.g. `clean install`,
    /// `compiler:compile`).
    ///
    /// Default: `[build].goals` from the config file.
    #[arg(value_name = "GOAL")]
    pub goals: Vec<String>,

    /// Path to the reactor description (TOML).
    ///
    /// Default: `Weave.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Weave.toml")]
    pub config: String,

    /// Degree of concurrency. The worker pool never grows beyond the number
    /// of projects in the reactor.
    #[arg(short = 'T', long, value_name = "N")]
    pub threads: Option<usize>,

    /// Stop at the first failure (default).
    #[arg(long = "fail-fast", visible_alias = "ff")]
    pub fail_fast: bool,

    /// Only fail the build afterwards; allow all non-impacted builds to
    /// continue.
    #[arg(long = "fail-at-end", visible_alias = "fae")]
    pub fail_at_end: bool,

    /// Never fail the build, regardless of project result.
    #[arg(long = "fail-never", visible_alias = "fn")]
    pub fail_never: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `WEAVE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the initial build plan, but don't execute
    /// any goals.
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    /// Failure behaviour selected on the command line, if any.
    pub fn failure_behaviour(&self) -> Option<FailureBehaviour> {
        if self.fail_fast {
            Some(FailureBehaviour::FailFast)
        } else if self.fail_at_end {
            Some(FailureBehaviour::FailAtEnd)
        } else if self.fail_never {
            Some(FailureBehaviour::FailNever)
        } else {
            None
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
