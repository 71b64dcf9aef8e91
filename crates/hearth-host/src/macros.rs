// ─── define_module! ──────────────────────────────────────────────────────────

/// Creates a [`ModuleDescriptor`] for a type implementing [`Module`] and
/// [`Default`].
///
/// # Syntax
///
/// ```rust,ignore
/// pub const ROUND_LOGGER: ModuleDescriptor = define_module! {
///     id: "round-logger",
///     module: RoundLogger,
///     name: "Round Logger",   // optional, defaults to the id
///     version: "2.0.0",       // optional, defaults to CARGO_PKG_VERSION
///     priority: 10,           // optional, defaults to 0
/// };
/// ```
///
/// The result is a const expression, so descriptors can live in `const`
/// items and be handed to [`export_package!`].
///
/// [`ModuleDescriptor`]: crate::ModuleDescriptor
/// [`Module`]: crate::Module
/// [`export_package!`]: crate::export_package
#[macro_export]
macro_rules! define_module {
    (
        id: $id:literal,
        module: $ty:ty
        $(, name: $name:literal)?
        $(, version: $version:literal)?
        $(, priority: $priority:expr)?
        $(,)?
    ) => {{
        fn __hearth_create() -> ::std::boxed::Box<dyn $crate::Module> {
            ::std::boxed::Box::new(<$ty as ::std::default::Default>::default())
        }
        $crate::ModuleDescriptor {
            api_version: $crate::HEARTH_MODULE_API_VERSION,
            id: $id,
            name: $crate::define_module!(@name $id $(, $name)?),
            version: $crate::define_module!(@ver $(, $version)?),
            priority: $crate::define_module!(@prio $(, $priority)?),
            create: __hearth_create,
        }
    }};

    // @name: explicit override, or fall back to the id.
    (@name $id:literal) => { $id };
    (@name $id:literal, $name:literal) => { $name };

    // @ver: explicit override, or the defining crate's package version.
    (@ver) => { ::std::env!("CARGO_PKG_VERSION") };
    (@ver, $version:literal) => { $version };

    // @prio
    (@prio) => { 0 };
    (@prio, $priority:expr) => { $priority };
}

// ─── export_package! ─────────────────────────────────────────────────────────

/// Exports a set of descriptors as a dynamic module package.
///
/// Emits the `hearth_package_entry` symbol the
/// [`PackageLoader`](crate::PackageLoader) resolves. Use once per `cdylib`
/// crate:
///
/// ```rust,ignore
/// export_package![ROUND_LOGGER, DOOR_GUARD];
/// ```
#[macro_export]
macro_rules! export_package {
    ( $( $descriptor:expr ),+ $(,)? ) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn hearth_package_entry() -> $crate::PackageEntry {
            static DESCRIPTORS: &[$crate::ModuleDescriptor] = &[$( $descriptor ),+];
            $crate::PackageEntry {
                descriptors: DESCRIPTORS.as_ptr(),
                len: DESCRIPTORS.len(),
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use crate::module::{HEARTH_MODULE_API_VERSION, Module, ModuleDescriptor};

    #[derive(Default)]
    struct Nop;
    #[async_trait]
    impl Module for Nop {}

    static PLAIN: ModuleDescriptor = define_module! { id: "nop", module: Nop };
    static FULL: ModuleDescriptor = define_module! {
        id: "nop-full",
        module: Nop,
        name: "Nop (full)",
        version: "9.9.9",
        priority: -3,
    };

    #[test]
    fn defaults_are_filled_in() {
        assert_eq!(PLAIN.id, "nop");
        assert_eq!(PLAIN.name, "nop");
        assert_eq!(PLAIN.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(PLAIN.priority, 0);
        assert_eq!(PLAIN.api_version, HEARTH_MODULE_API_VERSION);
    }

    #[test]
    fn overrides_are_honoured() {
        assert_eq!(FULL.name, "Nop (full)");
        assert_eq!(FULL.version, "9.9.9");
        assert_eq!(FULL.priority, -3);
    }
}
