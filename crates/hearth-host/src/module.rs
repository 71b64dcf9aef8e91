//! The module model: descriptor, lifecycle trait, and per-module context.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use hearth_core::{BoxError, EventEngine, ModuleId, Registration, RegistrationId};

// ─── API versioning ──────────────────────────────────────────────────────────

/// Current module API version (1.0).
///
/// Major in the high 16 bits, minor in the low 16. A descriptor is compatible
/// when its major matches the host exactly and its minor does not exceed the
/// host's.
pub const HEARTH_MODULE_API_VERSION: u32 = 0x0001_0000;

// ─── ModuleState ─────────────────────────────────────────────────────────────

/// Lifecycle state of an installed module.
///
/// ```text
/// install() ──► Loaded
///   enable()  ──► Enabled ◄──┐
///   disable() ──► Disabled ──┘
///   dispose() ──► Disposed   (terminal; entry is removed)
/// ```
///
/// A disabled module keeps its handler registrations; they are skipped during
/// dispatch until the module is enabled again. Disposal strips them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    /// Installed and initialised, not yet participating in dispatch.
    Loaded,
    /// Active; its handlers run during dispatch.
    Enabled,
    /// Temporarily inert; its handlers are skipped.
    Disabled,
    /// Torn down; only observed transiently by status-change subscribers.
    Disposed,
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModuleState::Loaded => "loaded",
            ModuleState::Enabled => "enabled",
            ModuleState::Disabled => "disabled",
            ModuleState::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

// ─── UnitId ──────────────────────────────────────────────────────────────────

/// Identity of one load of a module package.
///
/// Every load, including a reload of the same file, gets a fresh unit. Modules
/// from a reloaded package are therefore new installations; nothing in the
/// host ever rewrites an existing module's identity in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitId(pub(crate) u64);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit#{}", self.0)
    }
}

// ─── ModuleDescriptor ────────────────────────────────────────────────────────

/// A static, `Copy` descriptor that identifies and instantiates a module.
///
/// Produced by the [`define_module!`](crate::define_module) macro and exported
/// across the library boundary by [`export_package!`](crate::export_package).
///
/// # Memory layout
///
/// `ModuleDescriptor` is `#[repr(C)]` because it crosses the dynamic-library
/// boundary. Fields must not be reordered.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ModuleDescriptor {
    /// Module API version this descriptor was compiled against.
    pub api_version: u32,

    /// Stable identifier (case-insensitive; used in logs and config lookup).
    pub id: &'static str,

    /// Human-readable display name.
    pub name: &'static str,

    /// Semver version string of the module.
    pub version: &'static str,

    /// Lifecycle priority: higher enables earlier and disposes later.
    pub priority: i32,

    /// Factory function that creates the live [`Module`] instance.
    pub create: fn() -> Box<dyn Module>,
}

impl ModuleDescriptor {
    /// Returns `true` if this descriptor's API version is compatible with the
    /// running host.
    ///
    /// The major part must match exactly; the descriptor's minor part must be
    /// at most the host's minor part.
    pub fn is_compatible(&self) -> bool {
        let host_major = HEARTH_MODULE_API_VERSION >> 16;
        let host_minor = HEARTH_MODULE_API_VERSION & 0xFFFF;
        let desc_major = self.api_version >> 16;
        let desc_minor = self.api_version & 0xFFFF;
        desc_major == host_major && desc_minor <= host_minor
    }

    /// Creates the live module from the factory function.
    ///
    /// Prefer [`ModuleManager::install`](crate::ModuleManager::install), which
    /// also runs the compatibility check, notification hooks, and `on_init`.
    #[inline]
    pub fn instantiate(&self) -> Box<dyn Module> {
        (self.create)()
    }
}

// ─── ModuleInfo ──────────────────────────────────────────────────────────────

/// Snapshot of an installed module's identity and state.
#[derive(Debug, Clone)]
pub struct ModuleInfo {
    /// Stable identifier.
    pub id: ModuleId,
    /// Display name.
    pub name: String,
    /// Semver version string.
    pub version: String,
    /// Lifecycle priority.
    pub priority: i32,
    /// Current lifecycle state.
    pub state: ModuleState,
    /// The package load this module came from.
    pub unit: UnitId,
}

impl ModuleInfo {
    pub(crate) fn from_descriptor(descriptor: &ModuleDescriptor, unit: UnitId) -> Self {
        Self {
            id: ModuleId::new(descriptor.id),
            name: descriptor.name.to_string(),
            version: descriptor.version.to_string(),
            priority: descriptor.priority,
            state: ModuleState::Loaded,
            unit,
        }
    }
}

// ─── Module ──────────────────────────────────────────────────────────────────

/// Lifecycle hooks of a live module.
///
/// All hooks default to doing nothing. Hooks take `&self`; use interior
/// mutability (e.g. `Mutex<T>`) for state that changes across calls.
///
/// Hook failures are contained: a failed `on_init` aborts the installation,
/// while failures of the other hooks are logged and the lifecycle transition
/// proceeds.
#[async_trait]
pub trait Module: Send + Sync {
    /// Called once at installation, before the module can be enabled.
    ///
    /// This is where a module declares its event kinds and registers its
    /// handlers through [`ModuleContext::register`].
    async fn on_init(&self, ctx: &ModuleContext) -> Result<(), BoxError> {
        let _ = ctx;
        Ok(())
    }

    /// Called on every transition into [`ModuleState::Enabled`].
    async fn on_enable(&self, ctx: &ModuleContext) -> Result<(), BoxError> {
        let _ = ctx;
        Ok(())
    }

    /// Called on every transition out of [`ModuleState::Enabled`].
    async fn on_disable(&self, ctx: &ModuleContext) -> Result<(), BoxError> {
        let _ = ctx;
        Ok(())
    }

    /// Called once at disposal, after the module was disabled.
    async fn on_dispose(&self, ctx: &ModuleContext) -> Result<(), BoxError> {
        let _ = ctx;
        Ok(())
    }
}

// ─── ModuleContext ───────────────────────────────────────────────────────────

/// Context handed to every [`Module`] lifecycle hook.
///
/// Gives the module scoped access to the event engine and its own config
/// section. Registrations made through the context are owned by the module,
/// so they are gated on its enabled state and stripped at disposal.
///
/// # Example
///
/// ```rust,ignore
/// async fn on_init(&self, ctx: &ModuleContext) -> Result<(), BoxError> {
///     ctx.declare_marker("round-started")?;
///     ctx.register("round-started", Registration::sync_marker(|| Ok(())))?;
///     Ok(())
/// }
/// ```
pub struct ModuleContext {
    engine: Arc<EventEngine>,
    info: ModuleInfo,
    config: Arc<serde_json::Value>,
}

impl ModuleContext {
    pub(crate) fn new(
        engine: Arc<EventEngine>,
        info: ModuleInfo,
        config: Arc<serde_json::Value>,
    ) -> Self {
        Self {
            engine,
            info,
            config,
        }
    }

    /// The shared event engine.
    pub fn engine(&self) -> &Arc<EventEngine> {
        &self.engine
    }

    /// This module's identity and state snapshot.
    pub fn info(&self) -> &ModuleInfo {
        &self.info
    }

    /// Declares a payload-bearing event kind.
    pub fn declare<P: hearth_core::Payload>(
        &self,
        kind: &str,
    ) -> Result<(), hearth_core::RegisterError> {
        self.engine.declare::<P>(kind)
    }

    /// Declares a marker event kind.
    pub fn declare_marker(&self, kind: &str) -> Result<(), hearth_core::RegisterError> {
        self.engine.declare_marker(kind)
    }

    /// Registers a handler owned by this module.
    ///
    /// The owner is stamped onto the registration, so the handler is skipped
    /// while the module is not enabled and removed when it is disposed.
    pub fn register(
        &self,
        kind: &str,
        registration: Registration,
    ) -> Result<RegistrationId, hearth_core::RegisterError> {
        self.engine
            .register(kind, registration.owner(self.info.id.clone()))
    }

    /// Deserialises this module's config section into `T`.
    ///
    /// The section comes from `modules.<id>` in the host config, or an empty
    /// JSON object when absent; use `#[serde(default)]` to make all fields
    /// optional.
    pub fn config<T>(&self) -> serde_json::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        T::deserialize(self.config.as_ref())
    }
}
