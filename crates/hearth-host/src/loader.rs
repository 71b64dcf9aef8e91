//! Module package loading.
//!
//! A package is a set of [`ModuleDescriptor`]s delivered either statically
//! (linked into the host binary) or as a dynamic library that exports the
//! [`PACKAGE_ENTRY_SYMBOL`] entry point via
//! [`export_package!`](crate::export_package).
//!
//! Every load is stamped with a fresh [`UnitId`]; reloading a package never
//! rewrites an existing unit. Dynamic libraries are kept alive by reference
//! counting: the loader and every module installed from the package share one
//! `Arc`, so the library is only dropped once the package is unloaded *and*
//! all of its modules are disposed.

use std::any::Any;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::info;

use crate::error::LoadError;
use crate::module::{ModuleDescriptor, UnitId};

/// Name of the entry-point symbol a dynamic module package must export.
pub const PACKAGE_ENTRY_SYMBOL: &[u8] = b"hearth_package_entry";

/// The raw descriptor table returned by a package's entry point.
///
/// `#[repr(C)]` because it crosses the dynamic-library boundary. The pointed-
/// to descriptors must be `'static` within the exporting library; the loader
/// keeps the library mapped for as long as any of its modules live.
#[repr(C)]
pub struct PackageEntry {
    /// Pointer to the first descriptor.
    pub descriptors: *const ModuleDescriptor,
    /// Number of descriptors in the table.
    pub len: usize,
}

/// One successfully loaded package.
#[derive(Clone)]
pub struct LoadedPackage {
    /// Fresh identity of this load.
    pub unit: UnitId,
    /// Where the package came from (`static://<name>` or a library path).
    pub origin: String,
    /// The descriptors the package exports.
    pub descriptors: Vec<ModuleDescriptor>,
    /// Keeps the backing library mapped while modules from it are alive.
    pub(crate) keepalive: Option<Arc<dyn Any + Send + Sync>>,
}

/// Loads module packages and tracks what is currently loaded.
pub struct PackageLoader {
    next_unit: AtomicU64,
    packages: RwLock<HashMap<String, LoadedPackage>>,
    #[cfg(feature = "dynamic-loading")]
    dependencies: RwLock<Vec<Arc<libloading::Library>>>,
}

impl PackageLoader {
    /// Creates an empty loader.
    pub fn new() -> Self {
        Self {
            next_unit: AtomicU64::new(0),
            packages: RwLock::new(HashMap::new()),
            #[cfg(feature = "dynamic-loading")]
            dependencies: RwLock::new(Vec::new()),
        }
    }

    fn fresh_unit(&self) -> UnitId {
        UnitId(self.next_unit.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers a package that is linked into the host binary.
    pub fn load_static(&self, name: &str, descriptors: &[ModuleDescriptor]) -> LoadedPackage {
        let package = LoadedPackage {
            unit: self.fresh_unit(),
            origin: format!("static://{name}"),
            descriptors: descriptors.to_vec(),
            keepalive: None,
        };
        info!(
            package = %package.origin,
            unit = %package.unit,
            modules = package.descriptors.len(),
            "Static package loaded"
        );
        self.packages
            .write()
            .insert(package.origin.clone(), package.clone());
        package
    }

    /// Loads a dynamic module package from `path`.
    ///
    /// The file must be a platform library exporting
    /// [`PACKAGE_ENTRY_SYMBOL`]; every descriptor it returns must target a
    /// compatible host API version, or the whole package is rejected.
    #[cfg(feature = "dynamic-loading")]
    pub fn load_library(&self, path: &Path) -> Result<LoadedPackage, LoadError> {
        let library = Arc::new(self.open_library(path)?);
        let descriptors = Self::read_descriptors(&library, path)?;

        let package = LoadedPackage {
            unit: self.fresh_unit(),
            origin: path.display().to_string(),
            descriptors,
            keepalive: Some(library),
        };
        info!(
            package = %package.origin,
            unit = %package.unit,
            modules = package.descriptors.len(),
            "Module package loaded"
        );
        self.packages
            .write()
            .insert(package.origin.clone(), package.clone());
        Ok(package)
    }

    /// Loads a shared dependency library.
    ///
    /// Dependency libraries export no package entry point; they only need to
    /// be mapped so module packages can link against them. They stay mapped
    /// until [`clear_dependencies`](Self::clear_dependencies).
    #[cfg(feature = "dynamic-loading")]
    pub fn load_dependency(&self, path: &Path) -> Result<(), LoadError> {
        let library = self.open_library(path)?;
        info!(dependency = %path.display(), "Dependency library loaded");
        self.dependencies.write().push(Arc::new(library));
        Ok(())
    }

    /// Drops all shared dependency libraries still held by the loader.
    #[cfg(feature = "dynamic-loading")]
    pub fn clear_dependencies(&self) {
        self.dependencies.write().clear();
    }

    /// Forgets a loaded package. Returns `false` if the origin is unknown.
    ///
    /// The backing library stays mapped until the last module installed from
    /// it is disposed.
    pub fn unload(&self, origin: &str) -> bool {
        self.packages.write().remove(origin).is_some()
    }

    /// Reloads a dynamic package: forgets the old load and loads the file
    /// again under a fresh [`UnitId`].
    #[cfg(feature = "dynamic-loading")]
    pub fn reload(&self, path: &Path) -> Result<LoadedPackage, LoadError> {
        self.unload(&path.display().to_string());
        self.load_library(path)
    }

    /// Snapshot of all currently loaded packages.
    pub fn packages(&self) -> Vec<LoadedPackage> {
        self.packages.read().values().cloned().collect()
    }

    #[cfg(feature = "dynamic-loading")]
    fn open_library(&self, path: &Path) -> Result<libloading::Library, LoadError> {
        if !path.exists() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }
        let supported = path
            .extension()
            .is_some_and(|ext| ext == std::env::consts::DLL_EXTENSION);
        if !supported {
            return Err(LoadError::UnsupportedFormat(path.to_path_buf()));
        }
        // SAFETY: loading a library runs its initialisers; the plugin dirs
        // are operator-controlled, which is the trust boundary here.
        unsafe { libloading::Library::new(path) }.map_err(|e| LoadError::Format {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    #[cfg(feature = "dynamic-loading")]
    fn read_descriptors(
        library: &libloading::Library,
        path: &Path,
    ) -> Result<Vec<ModuleDescriptor>, LoadError> {
        // SAFETY: the symbol's signature is fixed by the export_package!
        // contract; a library exporting it with another signature is out of
        // contract in the same way any C ABI mismatch is.
        let entry = unsafe {
            library.get::<unsafe extern "C" fn() -> PackageEntry>(PACKAGE_ENTRY_SYMBOL)
        }
        .map_err(|e| LoadError::MissingEntry {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        // SAFETY: calling the entry point as declared by the contract.
        let table = unsafe { entry() };
        if table.descriptors.is_null() {
            return Err(LoadError::MissingEntry {
                path: path.to_path_buf(),
                reason: "entry point returned a null descriptor table".to_string(),
            });
        }
        // SAFETY: the table points at a static descriptor slice inside the
        // library, which stays mapped while `library` is alive.
        let descriptors =
            unsafe { std::slice::from_raw_parts(table.descriptors, table.len) }.to_vec();

        for descriptor in &descriptors {
            if !descriptor.is_compatible() {
                return Err(LoadError::Incompatible {
                    path: path.to_path_buf(),
                    module: descriptor.id.to_string(),
                    api_version: descriptor.api_version,
                });
            }
        }
        Ok(descriptors)
    }
}

impl Default for PackageLoader {
    fn default() -> Self {
        Self::new()
    }
}
