//! Module host: lifecycle management, package loading, and teardown.
//!
//! This crate layers the module model on top of the `hearth-core` event
//! engine:
//!
//! - [`Module`] and [`ModuleDescriptor`] define what a module is and how it
//!   is instantiated; [`define_module!`] builds descriptors.
//! - [`PackageLoader`] materialises descriptors from static registrations or
//!   from dynamic libraries exporting [`export_package!`]'s entry point.
//! - [`ModuleManager`] owns the installed modules, drives their lifecycle,
//!   gates their handlers on enabled state, and strips their registrations at
//!   disposal.
//! - [`LifecycleHooks`] lets host-side code observe and veto transitions.

mod error;
mod loader;
mod macros;
mod manager;
mod module;
mod notify;

pub use error::{HostError, HostResult, LoadError};
pub use loader::{LoadedPackage, PACKAGE_ENTRY_SYMBOL, PackageEntry, PackageLoader};
pub use manager::ModuleManager;
pub use module::{
    HEARTH_MODULE_API_VERSION, Module, ModuleContext, ModuleDescriptor, ModuleInfo, ModuleState,
    UnitId,
};
pub use notify::LifecycleHooks;
