//! Module lifecycle management.
//!
//! [`ModuleManager`] is the central owner of all installed modules. It:
//!
//! - Accepts [`ModuleDescriptor`]s from loaded packages and drives them
//!   through `on_init` into [`ModuleState::Loaded`].
//! - Drives enable/disable/dispose transitions, running the module hooks and
//!   the host-side [`LifecycleHooks`] around every transition.
//! - Shares the set of enabled module ids with the [`EventEngine`] as its
//!   owner gate, so handlers of non-enabled modules are skipped during
//!   dispatch without the engine knowing anything about modules.
//! - Strips a module's handler registrations from the engine at disposal.
//!
//! Hook failures are contained the same way handler failures are in the
//! engine: logged, never allowed to wedge a lifecycle transition. The one
//! exception is `on_init`, whose failure aborts the installation.
//!
//! # Example
//!
//! ```rust,ignore
//! let engine = Arc::new(EventEngine::new());
//! let manager = ModuleManager::new(engine.clone(), HashMap::new());
//! let package = loader.load_static("builtin", &[ROUND_LOGGER]);
//! manager.install_package(&package).await;
//! manager.enable_all().await;
//! // ...later...
//! manager.dispose_all().await;
//! ```

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::RwLock;
use tracing::{error, info, warn};

use hearth_core::{BoxError, EventEngine, ModuleId, OwnerGate};

use crate::error::{HostError, HostResult};
use crate::loader::LoadedPackage;
use crate::module::{Module, ModuleContext, ModuleDescriptor, ModuleInfo, ModuleState, UnitId};
use crate::notify::LifecycleHooks;

#[cfg(feature = "dynamic-loading")]
use crate::loader::PackageLoader;

// ─── EnabledSet ──────────────────────────────────────────────────────────────

/// The enabled module ids, shared with the engine as its [`OwnerGate`].
///
/// Kept as a separate object rather than gating through the manager itself,
/// so the engine holds no reference back into the manager.
#[derive(Default)]
struct EnabledSet(RwLock<HashSet<ModuleId>>);

impl OwnerGate for EnabledSet {
    fn owner_enabled(&self, owner: &ModuleId) -> bool {
        self.0.read().contains(owner)
    }
}

// ─── ModuleEntry (internal) ──────────────────────────────────────────────────

struct ModuleEntry {
    module: Arc<dyn Module>,
    info: ModuleInfo,
    config: Arc<serde_json::Value>,
    /// Keeps the backing library mapped while this module is alive.
    _keepalive: Option<Arc<dyn std::any::Any + Send + Sync>>,
}

// ─── ModuleManager ───────────────────────────────────────────────────────────

/// Central manager for module installation, lifecycle, and teardown.
///
/// # Module configuration
///
/// `module_configs` maps module id to the raw JSON section extracted from the
/// host config (`modules.<id>`). Each module reads its own section through
/// [`ModuleContext::config`].
pub struct ModuleManager {
    engine: Arc<EventEngine>,
    modules: RwLock<Vec<ModuleEntry>>,
    module_configs: HashMap<String, serde_json::Value>,
    hooks: Arc<LifecycleHooks>,
    enabled: Arc<EnabledSet>,
}

impl ModuleManager {
    /// Creates a manager bound to `engine` and installs the owner gate.
    pub fn new(engine: Arc<EventEngine>, module_configs: HashMap<String, serde_json::Value>) -> Self {
        let enabled = Arc::new(EnabledSet::default());
        engine.set_owner_gate(enabled.clone());
        Self {
            engine,
            modules: RwLock::new(Vec::new()),
            module_configs,
            hooks: Arc::new(LifecycleHooks::default()),
            enabled,
        }
    }

    /// The shared event engine.
    pub fn engine(&self) -> &Arc<EventEngine> {
        &self.engine
    }

    /// The lifecycle notification hooks.
    pub fn hooks(&self) -> &Arc<LifecycleHooks> {
        &self.hooks
    }

    /// Number of installed modules (in any state).
    pub fn module_count(&self) -> usize {
        self.modules.read().len()
    }

    /// State of the given module, or `None` if it is not installed.
    pub fn module_state(&self, id: &ModuleId) -> Option<ModuleState> {
        self.modules
            .read()
            .iter()
            .find(|e| e.info.id == *id)
            .map(|e| e.info.state)
    }

    /// Snapshot of all installed modules.
    pub fn modules(&self) -> Vec<ModuleInfo> {
        self.modules.read().iter().map(|e| e.info.clone()).collect()
    }

    // ─── Installation ────────────────────────────────────────────────────────

    /// Installs one module from a loaded package.
    ///
    /// Runs the pre-load hooks (any of which may cancel), instantiates the
    /// module, and runs `on_init`. On init failure the module is discarded
    /// and any handler registrations it made are stripped again.
    pub async fn install(
        &self,
        descriptor: &ModuleDescriptor,
        package: &LoadedPackage,
    ) -> HostResult<ModuleInfo> {
        if !descriptor.is_compatible() {
            warn!(
                module = descriptor.id,
                api_version = %format!("{:#010x}", descriptor.api_version),
                "Module API version mismatch; installing anyway, behaviour may be undefined"
            );
        }

        let info = ModuleInfo::from_descriptor(descriptor, package.unit);
        if self.module_state(&info.id).is_some() {
            return Err(HostError::DuplicateModuleId(info.id));
        }
        if !self.hooks.approve_load(&info) {
            info!(module = %info.id, "Installation cancelled by a subscriber");
            return Err(HostError::LoadCancelled(info.id));
        }

        let module: Arc<dyn Module> = Arc::from(descriptor.instantiate());
        let config = Arc::new(
            self.module_configs
                .get(descriptor.id)
                .cloned()
                .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new())),
        );
        let ctx = ModuleContext::new(self.engine.clone(), info.clone(), config.clone());
        if let Err(e) = run_hook(module.on_init(&ctx)).await {
            self.engine.remove_owned_by(&info.id);
            return Err(HostError::InitFailed {
                id: info.id,
                reason: e.to_string(),
            });
        }

        {
            let mut modules = self.modules.write();
            // Re-check: another install of the same id may have won the race
            // while on_init was running.
            if modules.iter().any(|e| e.info.id == info.id) {
                drop(modules);
                self.engine.remove_owned_by(&info.id);
                return Err(HostError::DuplicateModuleId(info.id));
            }
            modules.push(ModuleEntry {
                module,
                info: info.clone(),
                config,
                _keepalive: package.keepalive.clone(),
            });
        }
        info!(module = %info.id, unit = %info.unit, "Module installed");
        Ok(info)
    }

    /// Installs every module a package exports, logging and skipping
    /// individual failures. Returns the modules that were installed.
    pub async fn install_package(&self, package: &LoadedPackage) -> Vec<ModuleInfo> {
        let mut installed = Vec::new();
        for descriptor in &package.descriptors {
            match self.install(descriptor, package).await {
                Ok(info) => installed.push(info),
                Err(e) => error!(
                    module = descriptor.id,
                    package = %package.origin,
                    error = %e,
                    "Module installation failed"
                ),
            }
        }
        installed
    }

    // ─── Lifecycle transitions ───────────────────────────────────────────────

    /// Enables a module from [`ModuleState::Loaded`] or
    /// [`ModuleState::Disabled`].
    ///
    /// Returns `Ok(false)` without transitioning when a pre-enable subscriber
    /// cancels. A failing `on_enable` hook is logged and also yields
    /// `Ok(false)`, but the module still becomes enabled: its handlers were
    /// registered at init and the transition itself did happen.
    pub async fn enable(&self, id: &ModuleId) -> HostResult<bool> {
        let (module, mut info, config) = self.entry_for(id)?;
        match info.state {
            ModuleState::Loaded | ModuleState::Disabled => {}
            state => {
                return Err(HostError::AlreadyInState {
                    id: id.clone(),
                    state,
                });
            }
        }
        if !self.hooks.approve_enable(&info) {
            info!(module = %id, "Enable cancelled by a subscriber");
            return Ok(false);
        }

        self.hooks.notify_status_change(&info, ModuleState::Enabled);
        let ctx = ModuleContext::new(self.engine.clone(), info.clone(), config);
        let ok = match run_hook(module.on_enable(&ctx)).await {
            Ok(()) => true,
            Err(e) => {
                error!(module = %id, error = %e, "on_enable hook failed");
                false
            }
        };

        self.set_state(id, ModuleState::Enabled);
        self.enabled.0.write().insert(id.clone());
        info.state = ModuleState::Enabled;
        self.hooks.notify_enabled(&info, ok);
        info!(module = %id, "Module enabled");
        Ok(ok)
    }

    /// Disables a module from [`ModuleState::Enabled`].
    ///
    /// The module's handler registrations stay in the engine; the owner gate
    /// makes them inert until the next enable. Cancellation and hook-failure
    /// semantics mirror [`enable`](Self::enable).
    pub async fn disable(&self, id: &ModuleId) -> HostResult<bool> {
        let (module, mut info, config) = self.entry_for(id)?;
        if info.state != ModuleState::Enabled {
            return Err(HostError::AlreadyInState {
                id: id.clone(),
                state: info.state,
            });
        }
        if !self.hooks.approve_disable(&info) {
            info!(module = %id, "Disable cancelled by a subscriber");
            return Ok(false);
        }

        self.hooks.notify_status_change(&info, ModuleState::Disabled);
        let ctx = ModuleContext::new(self.engine.clone(), info.clone(), config);
        let ok = match run_hook(module.on_disable(&ctx)).await {
            Ok(()) => true,
            Err(e) => {
                error!(module = %id, error = %e, "on_disable hook failed");
                false
            }
        };

        self.set_state(id, ModuleState::Disabled);
        self.enabled.0.write().remove(id);
        info.state = ModuleState::Disabled;
        self.hooks.notify_disabled(&info, ok);
        info!(module = %id, "Module disabled");
        Ok(ok)
    }

    /// Disposes a module, in any state.
    ///
    /// An enabled module is disabled first. `on_dispose` failures are logged;
    /// the teardown always completes: the module's handler registrations are
    /// stripped from the engine and its entry is removed.
    pub async fn dispose(&self, id: &ModuleId) -> HostResult<()> {
        let (_, info, _) = self.entry_for(id)?;
        if info.state == ModuleState::Enabled
            && let Err(e) = self.disable(id).await
        {
            warn!(module = %id, error = %e, "Disable during disposal failed");
        }

        let (module, mut info, config) = self.entry_for(id)?;
        self.hooks.notify_status_change(&info, ModuleState::Disposed);
        let ctx = ModuleContext::new(self.engine.clone(), info.clone(), config);
        if let Err(e) = run_hook(module.on_dispose(&ctx)).await {
            error!(module = %id, error = %e, "on_dispose hook failed");
        }

        self.engine.remove_owned_by(id);
        self.enabled.0.write().remove(id);
        self.modules.write().retain(|e| e.info.id != *id);
        info.state = ModuleState::Disposed;
        self.hooks.notify_disposed(&info);
        info!(module = %id, "Module disposed");
        Ok(())
    }

    // ─── Bulk operations ─────────────────────────────────────────────────────

    /// Enables every loaded or disabled module, highest priority first.
    ///
    /// Individual failures and cancellations are logged and skipped.
    pub async fn enable_all(&self) {
        for id in self.ids_by_priority(true, |s| {
            matches!(s, ModuleState::Loaded | ModuleState::Disabled)
        }) {
            if let Err(e) = self.enable(&id).await {
                warn!(module = %id, error = %e, "Enable skipped");
            }
        }
    }

    /// Disables every enabled module, highest priority first (the same order
    /// as enabling).
    pub async fn disable_all(&self) {
        for id in self.ids_by_priority(true, |s| s == ModuleState::Enabled) {
            if let Err(e) = self.disable(&id).await {
                warn!(module = %id, error = %e, "Disable skipped");
            }
        }
    }

    /// Disposes every module, lowest priority first.
    pub async fn dispose_all(&self) {
        for id in self.ids_by_priority(false, |_| true) {
            if let Err(e) = self.dispose(&id).await {
                warn!(module = %id, error = %e, "Disposal failed");
            }
        }
    }

    /// Replaces the modules of a previous load with the contents of
    /// `package`.
    ///
    /// Every module installed from `old_unit` is disposed (remembering which
    /// were enabled), the new package's modules are installed, and the ones
    /// whose id was enabled before are enabled again.
    pub async fn replace_package(
        &self,
        old_unit: Option<UnitId>,
        package: &LoadedPackage,
    ) -> Vec<ModuleInfo> {
        let mut was_enabled = HashSet::new();
        if let Some(unit) = old_unit {
            let ids: Vec<(ModuleId, ModuleState)> = self
                .modules
                .read()
                .iter()
                .filter(|e| e.info.unit == unit)
                .map(|e| (e.info.id.clone(), e.info.state))
                .collect();
            for (id, state) in ids {
                if state == ModuleState::Enabled {
                    was_enabled.insert(id.clone());
                }
                if let Err(e) = self.dispose(&id).await {
                    warn!(module = %id, error = %e, "Disposal during replacement failed");
                }
            }
        }

        let installed = self.install_package(package).await;
        for info in &installed {
            if was_enabled.contains(&info.id)
                && let Err(e) = self.enable(&info.id).await
            {
                warn!(module = %info.id, error = %e, "Re-enable after replacement failed");
            }
        }
        installed
    }

    /// Reloads a dynamic package in place.
    ///
    /// The file is loaded again under a fresh unit and its modules replace
    /// those of the previous load of `path`, preserving the enabled set by
    /// id. The old library is unmapped once its last module entry is gone.
    #[cfg(feature = "dynamic-loading")]
    pub async fn reload_package(
        &self,
        loader: &PackageLoader,
        path: &std::path::Path,
    ) -> HostResult<Vec<ModuleInfo>> {
        let origin = path.display().to_string();
        let old_unit = loader
            .packages()
            .into_iter()
            .find(|p| p.origin == origin)
            .map(|p| p.unit);

        let package = loader.reload(path)?;
        Ok(self.replace_package(old_unit, &package).await)
    }

    // ─── Internals ───────────────────────────────────────────────────────────

    fn entry_for(
        &self,
        id: &ModuleId,
    ) -> HostResult<(Arc<dyn Module>, ModuleInfo, Arc<serde_json::Value>)> {
        self.modules
            .read()
            .iter()
            .find(|e| e.info.id == *id)
            .map(|e| (e.module.clone(), e.info.clone(), e.config.clone()))
            .ok_or_else(|| HostError::UnknownModule(id.clone()))
    }

    fn set_state(&self, id: &ModuleId, state: ModuleState) {
        if let Some(entry) = self.modules.write().iter_mut().find(|e| e.info.id == *id) {
            entry.info.state = state;
        }
    }

    fn ids_by_priority(
        &self,
        descending: bool,
        filter: impl Fn(ModuleState) -> bool,
    ) -> Vec<ModuleId> {
        let mut pending: Vec<(i32, ModuleId)> = self
            .modules
            .read()
            .iter()
            .filter(|e| filter(e.info.state))
            .map(|e| (e.info.priority, e.info.id.clone()))
            .collect();
        // Stable sort keeps installation order within one priority.
        if descending {
            pending.sort_by_key(|(p, _)| Reverse(*p));
        } else {
            pending.sort_by_key(|(p, _)| *p);
        }
        pending.into_iter().map(|(_, id)| id).collect()
    }
}

/// Runs a module hook, converting a panic into an ordinary hook error so a
/// misbehaving module cannot unwind through a lifecycle transition.
async fn run_hook<F>(hook: F) -> Result<(), BoxError>
where
    F: Future<Output = Result<(), BoxError>>,
{
    match AssertUnwindSafe(hook).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
                .unwrap_or("<opaque panic payload>");
            Err(format!("hook panicked: {message}").into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use hearth_core::{BoxError, Registration};

    use crate::loader::PackageLoader;
    use crate::define_module;
    use crate::module::HEARTH_MODULE_API_VERSION;

    fn manager() -> ModuleManager {
        ModuleManager::new(Arc::new(EventEngine::new()), HashMap::new())
    }

    fn descriptor_for(id: &'static str, create: fn() -> Box<dyn Module>) -> ModuleDescriptor {
        ModuleDescriptor {
            api_version: HEARTH_MODULE_API_VERSION,
            id,
            name: id,
            version: "1.0.0",
            priority: 0,
            create,
        }
    }

    #[tokio::test]
    async fn lifecycle_gates_handlers_and_disposal_strips_them() {
        static HITS: AtomicUsize = AtomicUsize::new(0);

        #[derive(Default)]
        struct RoundLogger;
        #[async_trait]
        impl Module for RoundLogger {
            async fn on_init(&self, ctx: &ModuleContext) -> Result<(), BoxError> {
                ctx.declare_marker("round-started")?;
                ctx.register(
                    "round-started",
                    Registration::sync_marker(|| {
                        HITS.fetch_add(1, Ordering::Relaxed);
                        Ok(())
                    }),
                )?;
                Ok(())
            }
        }

        let manager = manager();
        let loader = PackageLoader::new();
        let package = loader.load_static(
            "test",
            &[define_module! { id: "round-logger", module: RoundLogger }],
        );
        let info = manager.install(&package.descriptors[0], &package).await.unwrap();
        assert_eq!(info.state, ModuleState::Loaded);
        let id = info.id;

        let engine = manager.engine().clone();
        // Loaded: the registration exists but is gated off.
        engine.dispatch_marker("round-started").unwrap();
        assert_eq!(HITS.load(Ordering::Relaxed), 0);

        assert!(manager.enable(&id).await.unwrap());
        engine.dispatch_marker("round-started").unwrap();
        assert_eq!(HITS.load(Ordering::Relaxed), 1);

        assert!(manager.disable(&id).await.unwrap());
        assert_eq!(engine.handler_count("round-started"), 1);
        engine.dispatch_marker("round-started").unwrap();
        assert_eq!(HITS.load(Ordering::Relaxed), 1);

        manager.dispose(&id).await.unwrap();
        assert_eq!(engine.handler_count("round-started"), 0);
        assert_eq!(manager.module_count(), 0);
    }

    #[tokio::test]
    async fn invalid_transitions_are_rejected() {
        #[derive(Default)]
        struct Nop;
        #[async_trait]
        impl Module for Nop {}

        let manager = manager();
        let loader = PackageLoader::new();
        let package =
            loader.load_static("test", &[define_module! { id: "nop", module: Nop }]);
        let id = manager
            .install(&package.descriptors[0], &package)
            .await
            .unwrap()
            .id;

        // Disable before enable.
        assert!(matches!(
            manager.disable(&id).await,
            Err(HostError::AlreadyInState {
                state: ModuleState::Loaded,
                ..
            })
        ));
        manager.enable(&id).await.unwrap();
        assert!(matches!(
            manager.enable(&id).await,
            Err(HostError::AlreadyInState {
                state: ModuleState::Enabled,
                ..
            })
        ));

        // Duplicate install, case-insensitively.
        let dup = descriptor_for("NOP", || Box::new(Nop));
        assert!(matches!(
            manager.install(&dup, &package).await,
            Err(HostError::DuplicateModuleId(_))
        ));

        let ghost = ModuleId::new("ghost");
        assert!(matches!(
            manager.enable(&ghost).await,
            Err(HostError::UnknownModule(_))
        ));
    }

    #[tokio::test]
    async fn pre_transition_subscribers_can_cancel() {
        #[derive(Default)]
        struct Nop;
        #[async_trait]
        impl Module for Nop {}

        let manager = manager();
        let loader = PackageLoader::new();
        let package =
            loader.load_static("test", &[define_module! { id: "nop", module: Nop }]);

        manager.hooks().on_pre_load(|info| info.id != ModuleId::new("blocked"));
        let blocked = descriptor_for("blocked", || Box::new(Nop));
        assert!(matches!(
            manager.install(&blocked, &package).await,
            Err(HostError::LoadCancelled(_))
        ));

        let id = manager
            .install(&package.descriptors[0], &package)
            .await
            .unwrap()
            .id;

        let post_fired = Arc::new(AtomicUsize::new(0));
        {
            let post_fired = post_fired.clone();
            manager.hooks().on_post_enable(move |_, _| {
                post_fired.fetch_add(1, Ordering::Relaxed);
            });
        }
        manager.hooks().on_pre_enable(|_| false);

        // Cancelled: no transition, no post notification.
        assert!(!manager.enable(&id).await.unwrap());
        assert_eq!(manager.module_state(&id), Some(ModuleState::Loaded));
        assert_eq!(post_fired.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn failed_enable_hook_still_transitions() {
        #[derive(Default)]
        struct Flaky;
        #[async_trait]
        impl Module for Flaky {
            async fn on_enable(&self, _: &ModuleContext) -> Result<(), BoxError> {
                Err("refused".into())
            }
        }

        let manager = manager();
        let loader = PackageLoader::new();
        let package =
            loader.load_static("test", &[define_module! { id: "flaky", module: Flaky }]);
        let id = manager
            .install(&package.descriptors[0], &package)
            .await
            .unwrap()
            .id;

        let outcomes = Arc::new(Mutex::new(Vec::new()));
        {
            let outcomes = outcomes.clone();
            manager.hooks().on_post_enable(move |_, ok| outcomes.lock().push(ok));
        }

        assert!(!manager.enable(&id).await.unwrap());
        assert_eq!(manager.module_state(&id), Some(ModuleState::Enabled));
        assert_eq!(*outcomes.lock(), vec![false]);
    }

    #[tokio::test]
    async fn failed_init_aborts_install_and_strips_registrations() {
        #[derive(Default)]
        struct Broken;
        #[async_trait]
        impl Module for Broken {
            async fn on_init(&self, ctx: &ModuleContext) -> Result<(), BoxError> {
                ctx.declare_marker("round-started")?;
                ctx.register("round-started", Registration::sync_marker(|| Ok(())))?;
                Err("init exploded".into())
            }
        }

        let manager = manager();
        let loader = PackageLoader::new();
        let package =
            loader.load_static("test", &[define_module! { id: "broken", module: Broken }]);

        assert!(matches!(
            manager.install(&package.descriptors[0], &package).await,
            Err(HostError::InitFailed { .. })
        ));
        assert_eq!(manager.module_count(), 0);
        assert_eq!(manager.engine().handler_count("round-started"), 0);
    }

    #[tokio::test]
    async fn bulk_transitions_follow_priority_order() {
        static LOG: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());

        macro_rules! probe {
            ($ty:ident, $tag:literal) => {
                #[derive(Default)]
                struct $ty;
                #[async_trait]
                impl Module for $ty {
                    async fn on_enable(&self, _: &ModuleContext) -> Result<(), BoxError> {
                        LOG.lock().push(concat!($tag, "+"));
                        Ok(())
                    }
                    async fn on_dispose(&self, _: &ModuleContext) -> Result<(), BoxError> {
                        LOG.lock().push(concat!($tag, "-"));
                        Ok(())
                    }
                }
            };
        }
        probe!(Early, "early");
        probe!(Late, "late");

        let manager = manager();
        let loader = PackageLoader::new();
        let package = loader.load_static(
            "test",
            &[
                define_module! { id: "late", module: Late, priority: -1 },
                define_module! { id: "early", module: Early, priority: 7 },
            ],
        );
        manager.install_package(&package).await;

        manager.enable_all().await;
        manager.dispose_all().await;
        assert_eq!(*LOG.lock(), vec!["early+", "late+", "late-", "early-"]);
    }

    #[tokio::test]
    async fn bulk_disable_runs_highest_priority_first() {
        static LOG: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());

        macro_rules! probe {
            ($ty:ident, $tag:literal) => {
                #[derive(Default)]
                struct $ty;
                #[async_trait]
                impl Module for $ty {
                    async fn on_disable(&self, _: &ModuleContext) -> Result<(), BoxError> {
                        LOG.lock().push($tag);
                        Ok(())
                    }
                }
            };
        }
        probe!(High, "high");
        probe!(Low, "low");

        let manager = manager();
        let loader = PackageLoader::new();
        let package = loader.load_static(
            "test",
            &[
                define_module! { id: "low", module: Low, priority: -1 },
                define_module! { id: "high", module: High, priority: 7 },
            ],
        );
        manager.install_package(&package).await;
        manager.enable_all().await;

        manager.disable_all().await;
        assert_eq!(*LOG.lock(), vec!["high", "low"]);
    }

    #[tokio::test]
    async fn replacing_a_package_restores_the_enabled_set() {
        #[derive(Default)]
        struct Nop;
        #[async_trait]
        impl Module for Nop {}

        let manager = manager();
        let loader = PackageLoader::new();
        let descriptors = [
            define_module! { id: "keeper", module: Nop },
            define_module! { id: "sleeper", module: Nop },
        ];

        let first = loader.load_static("pkg", &descriptors);
        manager.install_package(&first).await;
        let keeper = ModuleId::new("keeper");
        manager.enable(&keeper).await.unwrap();

        // Byte-identical content still gets a fresh unit.
        let second = loader.load_static("pkg", &descriptors);
        assert_ne!(first.unit, second.unit);

        let installed = manager.replace_package(Some(first.unit), &second).await;
        assert_eq!(installed.len(), 2);
        assert!(installed.iter().all(|info| info.unit == second.unit));
        assert_eq!(manager.module_state(&keeper), Some(ModuleState::Enabled));
        assert_eq!(
            manager.module_state(&ModuleId::new("sleeper")),
            Some(ModuleState::Loaded)
        );
    }

    #[tokio::test]
    async fn panicking_hooks_are_contained() {
        #[derive(Default)]
        struct EnablePanics;
        #[async_trait]
        impl Module for EnablePanics {
            async fn on_enable(&self, _: &ModuleContext) -> Result<(), BoxError> {
                panic!("enable blew up");
            }
        }

        #[derive(Default)]
        struct InitPanics;
        #[async_trait]
        impl Module for InitPanics {
            async fn on_init(&self, _: &ModuleContext) -> Result<(), BoxError> {
                panic!("init blew up");
            }
        }

        let manager = manager();
        let loader = PackageLoader::new();
        let package = loader.load_static(
            "test",
            &[define_module! { id: "enable-panics", module: EnablePanics }],
        );
        let id = manager
            .install(&package.descriptors[0], &package)
            .await
            .unwrap()
            .id;

        // Same containment as a failing hook: transition happens, `false`
        // reported.
        assert!(!manager.enable(&id).await.unwrap());
        assert_eq!(manager.module_state(&id), Some(ModuleState::Enabled));

        let broken = descriptor_for("init-panics", || Box::new(InitPanics));
        assert!(matches!(
            manager.install(&broken, &package).await,
            Err(HostError::InitFailed { .. })
        ));
        assert_eq!(manager.module_count(), 1);
    }

    #[tokio::test]
    async fn status_changes_are_announced_in_order() {
        #[derive(Default)]
        struct Nop;
        #[async_trait]
        impl Module for Nop {}

        let manager = manager();
        let loader = PackageLoader::new();
        let package =
            loader.load_static("test", &[define_module! { id: "nop", module: Nop }]);
        let id = manager
            .install(&package.descriptors[0], &package)
            .await
            .unwrap()
            .id;

        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = seen.clone();
            manager
                .hooks()
                .on_status_change(move |_, next| seen.lock().push(next));
        }

        manager.enable(&id).await.unwrap();
        manager.dispose(&id).await.unwrap();
        assert_eq!(
            *seen.lock(),
            vec![
                ModuleState::Enabled,
                ModuleState::Disabled,
                ModuleState::Disposed
            ]
        );
    }
}
