//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;
use hearth_host::HostError;

/// Errors surfaced by the runtime layer.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A module host operation failed.
    #[error("host error: {0}")]
    Host(#[from] HostError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
