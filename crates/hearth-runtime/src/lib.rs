//! Hearth Runtime - Orchestration layer for the hearth module host.
//!
//! This crate provides:
//! - Runtime orchestration (`HearthRuntime`)
//! - Layered configuration loading (`ConfigLoader`)
//! - Package directory scanning
//! - Logging configuration
//!
//! ```ignore
//! use hearth_runtime::HearthRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Loads hearth.toml, sets up logging, scans the package directory
//!     let runtime = HearthRuntime::from_env()?;
//!
//!     // Statically linked modules can be registered directly
//!     runtime.register_package("builtin", MY_MODULES).await;
//!
//!     // Run until Ctrl+C
//!     runtime.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `toml-config` (default): TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output format
//! - `dynamic-loading` (default): load module packages from shared libraries

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

// Re-exports
pub use config::{
    ConfigError, ConfigLoader, ConfigResult, HostConfig, LogFormat, LogLevel, LogOutput,
    LoggingConfig, PackageDirConfig, Profile,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::LoggingBuilder;
pub use runtime::{HearthRuntime, RuntimeBuilder};

// Re-export tracing for use by module crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides all the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
