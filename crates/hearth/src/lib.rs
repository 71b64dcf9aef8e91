//! # Hearth
//!
//! A module host for long-running servers: isolated modules, a shared event
//! engine, and dynamically loadable packages.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌───────────────┐     ┌──────────────────────────────┐
//! │   Runtime   │────▶│ ModuleManager │────▶│ Module "audit"   (own state) │
//! │ (discovery, │     │  (lifecycle,  │────▶│ Module "metrics" (own state) │
//! │   signals)  │     │   teardown)   │────▶│ Module ...                   │
//! └─────────────┘     └───────┬───────┘     └──────────────┬───────────────┘
//!                             │                            │ handlers
//!                             ▼                            ▼
//!                     ┌───────────────────────────────────────────┐
//!                     │ EventEngine: declared kinds, priorities,  │
//!                     │ veto, catch-all forwarding, isolation     │
//!                     └───────────────────────────────────────────┘
//! ```
//!
//! - **Runtime**: loads configuration, scans package directories, handles
//!   shutdown signals
//! - **ModuleManager**: installs packages and drives module state
//!   (loaded, enabled, disabled, disposed)
//! - **Modules**: isolated units that register event handlers; a failing
//!   handler never takes down its neighbours
//! - **EventEngine**: priority-ordered sequential dispatch with veto
//!   support and catch-all forwarding
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hearth::prelude::*;
//!
//! #[derive(Default, Clone, Payload)]
//! struct ChatLine {
//!     text: String,
//! }
//!
//! struct Echo;
//!
//! #[async_trait::async_trait]
//! impl Module for Echo {
//!     async fn on_enable(&self, ctx: &ModuleContext) -> Result<(), BoxError> {
//!         ctx.declare::<ChatLine>("chat-line")?;
//!         ctx.register(
//!             "chat-line",
//!             Registration::sync(|line: &mut ChatLine| {
//!                 println!("{}", line.text);
//!                 Ok(())
//!             }),
//!         )?;
//!         Ok(())
//!     }
//! }
//!
//! static ECHO: ModuleDescriptor = define_module! {
//!     id: "echo",
//!     module: Echo,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = HearthRuntime::from_env()?;
//!     runtime.register_package("builtin", std::slice::from_ref(&ECHO)).await;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `macros` (default): `Payload` derive macro
//! - `toml-config` (default): TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output
//! - `dynamic-loading` (default): load module packages from shared libraries

pub use hearth_core as core;
pub use hearth_host as host;
pub use hearth_runtime as runtime;

#[cfg(feature = "macros")]
pub use hearth_macros::Payload;

/// Prelude module for convenient imports.
///
/// This module provides all commonly used types for building module
/// packages:
///
/// ```rust,ignore
/// use hearth::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use hearth_runtime::HearthRuntime;

    // Module system - primary unit of functionality
    pub use hearth_host::{
        Module, ModuleContext, ModuleDescriptor, ModuleInfo, ModuleState, define_module,
        export_package,
    };

    // Event system - for registering and dispatching
    pub use hearth_core::{
        BoxError, DispatchOutcome, EventEngine, Flow, ModuleId, Payload, Registration,
        RegistrationId,
    };

    // Payload derive macro; shares the trait's name, like serde's derives
    #[cfg(feature = "macros")]
    pub use hearth_macros::Payload;

    // Logging macros
    pub use hearth_runtime::prelude::*;
}
