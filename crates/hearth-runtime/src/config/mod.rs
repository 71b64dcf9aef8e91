//! Configuration for the hearth runtime.
//!
//! Layered loading (defaults, config files, `HEARTH_*` environment
//! variables, programmatic overrides) of the host settings: logging, package
//! discovery, and per-module config sections.

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile};
pub use schema::{
    HostConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, PackageDirConfig,
};
