//! Runtime orchestration for the module host.
//!
//! The runtime ties the pieces together: it loads configuration, sets up
//! logging, discovers module packages, and drives the module lifecycle from
//! startup through shutdown.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use hearth_runtime::HearthRuntime;
//!
//! // Simplest way - auto-loads config from the current directory
//! let runtime = HearthRuntime::from_env()?;
//! runtime.run().await?;
//! ```

use std::sync::Arc;

use tokio::signal;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::config::{ConfigLoader, HostConfig};
use crate::error::RuntimeResult;
use crate::logging;
use hearth_core::EventEngine;
use hearth_host::{ModuleDescriptor, ModuleInfo, ModuleManager, PackageLoader};

/// The main runtime that hosts module packages.
///
/// # Simple Usage
///
/// ```rust,ignore
/// use hearth_runtime::HearthRuntime;
///
/// let runtime = HearthRuntime::from_env()?;
/// runtime.register_package("builtin", BUILTIN_MODULES).await;
/// runtime.run().await?;
/// ```
///
/// # Custom Configuration
///
/// ```rust,ignore
/// let config = ConfigLoader::new()
///     .file("config/hearth.toml")
///     .profile("production")
///     .load()?;
/// let runtime = HearthRuntime::new(config);
/// ```
pub struct HearthRuntime {
    /// The configuration.
    config: HostConfig,
    /// The event engine shared with all modules.
    engine: Arc<EventEngine>,
    /// The package loader.
    loader: Arc<PackageLoader>,
    /// The module lifecycle manager.
    manager: Arc<ModuleManager>,
    /// Whether the runtime is running.
    running: Arc<RwLock<bool>>,
}

impl HearthRuntime {
    /// Creates a new runtime from configuration.
    ///
    /// Initializes logging based on the configuration (a no-op if logging
    /// was already set up) and wires the engine, loader, and manager.
    pub fn new(config: HostConfig) -> Self {
        logging::init_from_config(&config.logging);

        let engine = Arc::new(EventEngine::new());
        let manager = Arc::new(ModuleManager::new(
            Arc::clone(&engine),
            config.modules.clone(),
        ));

        info!(
            log_level = %config.logging.level,
            package_dir = %config.packages.dir.display(),
            "Hearth runtime created"
        );

        Self {
            config,
            engine,
            loader: Arc::new(PackageLoader::new()),
            manager,
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Creates a runtime with automatic configuration loading.
    ///
    /// Searches for `hearth.toml` (and profile variants) in the standard
    /// locations and applies `HEARTH_*` environment variables.
    pub fn from_env() -> RuntimeResult<Self> {
        let config = ConfigLoader::new().load()?;
        Ok(Self::new(config))
    }

    /// Creates a runtime builder for custom configuration.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let runtime = HearthRuntime::builder()
    ///     .config_file("config/hearth.toml")
    ///     .profile("production")
    ///     .build()?;
    /// ```
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Returns the loaded configuration.
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Returns the event engine.
    pub fn engine(&self) -> &Arc<EventEngine> {
        &self.engine
    }

    /// Returns the module lifecycle manager.
    pub fn manager(&self) -> &Arc<ModuleManager> {
        &self.manager
    }

    /// Returns the package loader.
    pub fn loader(&self) -> &Arc<PackageLoader> {
        &self.loader
    }

    /// Registers a package of statically linked modules.
    ///
    /// The modules are installed but not enabled; [`start`](Self::start)
    /// enables everything that was installed.
    pub async fn register_package(
        &self,
        name: &str,
        descriptors: &[ModuleDescriptor],
    ) -> Vec<ModuleInfo> {
        let package = self.loader.load_static(name, descriptors);
        self.manager.install_package(&package).await
    }

    /// Scans the configured package directories and installs every package
    /// found there.
    ///
    /// Shared dependency libraries are loaded first, then the shared
    /// directory (if configured), then the main package directory. A file
    /// that fails to load is logged and skipped; the scan continues.
    #[cfg(feature = "dynamic-loading")]
    pub async fn scan_package_dirs(&self) -> Vec<ModuleInfo> {
        let deps_dir = self.config.packages.dependencies_path();
        if deps_dir.is_dir() {
            for path in library_files(&deps_dir) {
                if let Err(e) = self.loader.load_dependency(&path) {
                    warn!(path = %path.display(), error = %e, "Failed to load dependency library");
                }
            }
        }

        let mut installed = Vec::new();

        let mut dirs = Vec::new();
        if let Some(shared) = &self.config.packages.shared_dir {
            dirs.push(shared.clone());
        }
        dirs.push(self.config.packages.dir.clone());

        for dir in dirs {
            if !dir.is_dir() {
                continue;
            }
            for path in library_files(&dir) {
                // Skip anything under the dependencies directory.
                if path.parent() == Some(deps_dir.as_path()) {
                    continue;
                }
                match self.loader.load_library(&path) {
                    Ok(package) => {
                        let infos = self.manager.install_package(&package).await;
                        info!(
                            path = %path.display(),
                            modules = infos.len(),
                            "Package installed"
                        );
                        installed.extend(infos);
                    }
                    Err(e) => {
                        error!(path = %path.display(), error = %e, "Failed to load package");
                    }
                }
            }
        }

        installed
    }

    /// Starts the runtime: discovers packages and enables all modules.
    pub async fn start(&self) -> RuntimeResult<()> {
        {
            let mut running = self.running.write().await;
            if *running {
                warn!("Runtime is already running");
                return Ok(());
            }
            *running = true;
        }

        info!("Starting Hearth runtime");

        #[cfg(feature = "dynamic-loading")]
        self.scan_package_dirs().await;

        self.manager.enable_all().await;

        info!(modules = self.manager.module_count(), "Runtime started");

        Ok(())
    }

    /// Stops the runtime, disposing every module.
    pub async fn stop(&self) -> RuntimeResult<()> {
        {
            let mut running = self.running.write().await;
            if !*running {
                warn!("Runtime is not running");
                return Ok(());
            }
            *running = false;
        }

        info!("Stopping Hearth runtime");

        self.manager.dispose_all().await;
        // Disposal strips module-owned handlers; host-side subscriptions
        // have no owner and are swept separately.
        self.engine.remove_unowned();

        #[cfg(feature = "dynamic-loading")]
        self.loader.clear_dependencies();

        info!("Runtime stopped");

        Ok(())
    }

    /// Runs the runtime until a shutdown signal is received.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.start().await?;

        info!("Hearth runtime is now running. Press Ctrl+C to stop.");

        self.wait_for_shutdown().await;

        self.stop().await?;

        Ok(())
    }

    /// Runs the runtime with a custom shutdown future.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: std::future::Future<Output = ()>,
    {
        self.start().await?;

        shutdown.await;

        self.stop().await?;

        Ok(())
    }

    /// Waits for shutdown signals (Ctrl+C or SIGTERM).
    async fn wait_for_shutdown(&self) {
        #[cfg(unix)]
        {
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to register SIGTERM handler");

            tokio::select! {
                _ = signal::ctrl_c() => {
                    info!("Received Ctrl+C, shutting down");
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down");
                }
            }
        }

        #[cfg(not(unix))]
        {
            signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
            info!("Received Ctrl+C, shutting down");
        }
    }
}

// ─── RuntimeBuilder ──────────────────────────────────────────────────────────

/// Builder for creating a [`HearthRuntime`] with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// let runtime = HearthRuntime::builder()
///     .config_file("config/production.toml")
///     .profile("production")
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g., "development", "production").
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Enables loading environment variables (enabled by default).
    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: HostConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Builds the runtime.
    pub fn build(self) -> RuntimeResult<HearthRuntime> {
        let config = self.config_loader.load()?;
        Ok(HearthRuntime::new(config))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Lists loadable library files in a directory, sorted by file name.
#[cfg(feature = "dynamic-loading")]
fn library_files(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    let mut files: Vec<_> = std::fs::read_dir(dir)
        .into_iter()
        .flatten()
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(std::env::consts::DLL_EXTENSION)
        })
        .collect();
    files.sort();
    files
}
