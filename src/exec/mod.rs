// src/exec/mod.rs

//! Goal execution layer.
//!
//! The scheduler hands each step's ordered, configured executions to a
//! [`MojoExecutor`]. Step bodies run on blocking worker threads, so
//! executors are plain synchronous code.
//!
//! - [`executor`] provides the `MojoExecutor` trait.
//! - [`shell`] provides `ShellMojoExecutor`, which runs each goal's shell
//!   command with `sh -c` (or `cmd /C` on Windows).
//! - [`configurator`] merges plugin and execution configuration and keeps
//!   only the parameters a goal declares.

pub mod configurator;
pub mod executor;
pub mod shell;

pub use configurator::{
    ConfiguratorRegistry, DefaultMojoExecutionConfigurator, MojoExecutionConfigurator,
    finalize_configuration,
};
pub use executor::MojoExecutor;
pub use shell::ShellMojoExecutor;
