//! Core event dispatch engine for the hearth module host.
//!
//! This crate knows nothing about modules, packages, or configuration. It
//! provides the [`EventEngine`]: declared event kinds, four explicit handler
//! shapes, priority-ordered sequential delivery with veto support, catch-all
//! forwarding, and per-handler failure isolation. The module host in
//! `hearth-host` builds the lifecycle model on top of it.

mod engine;
mod error;
mod handler;
mod kind;
mod owner;
mod payload;

pub use engine::{DispatchOutcome, EventEngine};
pub use error::{DispatchError, RegisterError};
pub use handler::{BoxError, Flow, Registration, RegistrationId};
pub use kind::{ANY_KIND, FRAME_KINDS};
pub use owner::{ModuleId, OwnerGate};
pub use payload::{Payload, PayloadPool};
