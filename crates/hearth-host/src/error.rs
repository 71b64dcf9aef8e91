//! Error types for the module host.

use std::path::PathBuf;

use thiserror::Error;

use hearth_core::ModuleId;

use crate::module::ModuleState;

/// Result alias for host operations.
pub type HostResult<T> = Result<T, HostError>;

/// Failures to materialise a module package from disk.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The package path does not exist.
    #[error("module package not found: {0}")]
    NotFound(PathBuf),

    /// The file is not a loadable library for this platform.
    #[error("unsupported module package format: {0}")]
    UnsupportedFormat(PathBuf),

    /// The library exists but could not be opened.
    #[error("malformed module package {path}: {reason}")]
    Format {
        /// Path of the rejected package.
        path: PathBuf,
        /// Loader diagnostic.
        reason: String,
    },

    /// The library opened but does not export the package entry point.
    #[error("module package {path} has no entry point: {reason}")]
    MissingEntry {
        /// Path of the rejected package.
        path: PathBuf,
        /// Loader diagnostic.
        reason: String,
    },

    /// A descriptor in the package was built against an incompatible host API.
    #[error("module '{module}' in {path} targets incompatible host API {api_version:#010x}")]
    Incompatible {
        /// Path of the rejected package.
        path: PathBuf,
        /// Id of the offending module.
        module: String,
        /// API version the descriptor was compiled against.
        api_version: u32,
    },
}

/// Failures of module lifecycle operations.
#[derive(Debug, Error)]
pub enum HostError {
    /// The requested transition is invalid from the module's current state.
    #[error("module '{id}' is {state}; transition rejected")]
    AlreadyInState {
        /// The targeted module.
        id: ModuleId,
        /// Its current state.
        state: ModuleState,
    },

    /// No module with this id is installed.
    #[error("unknown module '{0}'")]
    UnknownModule(ModuleId),

    /// A module with this id is already installed.
    #[error("module id '{0}' is already installed")]
    DuplicateModuleId(ModuleId),

    /// A pre-load subscriber rejected the installation.
    #[error("installation of module '{0}' was cancelled by a subscriber")]
    LoadCancelled(ModuleId),

    /// The module's `on_init` hook failed; the module was not installed.
    #[error("module '{id}' failed to initialise: {reason}")]
    InitFailed {
        /// The failing module.
        id: ModuleId,
        /// Error reported by the hook.
        reason: String,
    },

    /// A package could not be loaded.
    #[error(transparent)]
    Load(#[from] LoadError),
}
