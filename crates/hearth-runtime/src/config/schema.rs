//! Configuration schema definitions.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HostConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Where module packages are discovered.
    #[serde(default)]
    pub packages: PackageDirConfig,

    /// Per-module config sections, keyed by module id.
    #[serde(default)]
    pub modules: HashMap<String, serde_json::Value>,
}

/// Module package discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageDirConfig {
    /// Directory scanned for module packages.
    #[serde(default = "default_package_dir")]
    pub dir: PathBuf,

    /// Directory of shared dependency libraries, loaded before any package.
    /// Resolved under [`dir`](Self::dir) when relative.
    #[serde(default = "default_dependencies_dir")]
    pub dependencies_dir: PathBuf,

    /// Optional extra package directory shared between host instances.
    #[serde(default)]
    pub shared_dir: Option<PathBuf>,
}

impl Default for PackageDirConfig {
    fn default() -> Self {
        Self {
            dir: default_package_dir(),
            dependencies_dir: default_dependencies_dir(),
            shared_dir: None,
        }
    }
}

impl PackageDirConfig {
    /// The effective dependencies directory.
    pub fn dependencies_path(&self) -> PathBuf {
        if self.dependencies_dir.is_absolute() {
            self.dependencies_dir.clone()
        } else {
            self.dir.join(&self.dependencies_dir)
        }
    }
}

fn default_package_dir() -> PathBuf {
    PathBuf::from("modules")
}

fn default_dependencies_dir() -> PathBuf {
    PathBuf::from("dependencies")
}

/// Log verbosity threshold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose.
    Trace,
    /// Debugging detail.
    Debug,
    /// Normal operation (default).
    #[default]
    Info,
    /// Unexpected but recoverable situations.
    Warn,
    /// Failures only.
    Error,
}

impl LogLevel {
    /// The level as a lowercase filter string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Converts to the tracing level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line, abbreviated (default).
    #[default]
    Compact,
    /// Single-line with full metadata.
    Full,
    /// Multi-line, human-oriented.
    Pretty,
    /// Newline-delimited JSON.
    #[cfg(feature = "json-log")]
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// Standard output (default).
    #[default]
    Stdout,
    /// Standard error.
    Stderr,
    /// A log file; requires [`LoggingConfig::file_path`].
    File,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Global log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Output destination.
    #[serde(default)]
    pub output: LogOutput,

    /// Log file path, used when `output` is `file`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Include thread ids in log lines.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line number in log lines.
    #[serde(default)]
    pub file_location: bool,

    /// Per-target level overrides, e.g. `hearth_core = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}
