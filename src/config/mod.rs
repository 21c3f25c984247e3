// src/config/mod.rs

//! Reactor description loaded from `Weave.toml`.
//!
//! - [`model`]: serde types (`RawConfigFile`, `ConfigFile`).
//! - [`validate`]: `RawConfigFile -> ConfigFile` checks.
//! - [`loader`]: reading files from disk.
//! - [`reactor`]: conversion into projects, plugin descriptors and lifecycles.

pub mod loader;
pub mod model;
pub mod reactor;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{ConfigFile, RawConfigFile};
