//! Error types for the event dispatch engine.

use thiserror::Error;

/// Rejected handler registrations.
///
/// All of these are surfaced to the registering caller immediately; a
/// registration that would fail at dispatch time is never accepted.
#[derive(Debug, Error)]
pub enum RegisterError {
    /// The event kind was never declared.
    #[error("unknown event kind '{0}'; declare it before registering handlers")]
    UnknownKind(String),

    /// The kind was already declared with a different payload type.
    #[error("event kind '{kind}' already declared with payload {existing}, not {requested}")]
    KindConflict {
        /// The conflicting kind name.
        kind: String,
        /// Payload type the kind was declared with.
        existing: &'static str,
        /// Payload type of the rejected re-declaration.
        requested: &'static str,
    },

    /// The handler's payload type does not match the kind's declaration.
    #[error("handler payload mismatch on '{kind}': kind declares {expected}, handler takes {got}")]
    PayloadMismatch {
        /// The event kind being registered against.
        kind: String,
        /// Payload type declared by the kind.
        expected: &'static str,
        /// Payload type the handler was built for.
        got: &'static str,
    },

    /// Catch-all subscriptions must use the observe shape.
    #[error("catch-all subscriptions must use the observe shape")]
    ObserveShapeRequired,

    /// Observe handlers are only valid on the catch-all kind.
    #[error("observe handlers may only be registered on the catch-all kind")]
    ObserveOnConcreteKind,
}

/// Errors raised by a dispatch call.
///
/// Handler misbehavior never produces one of these; every variant indicates
/// the host is driving the engine incorrectly.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The kind is already being dispatched, which would otherwise become
    /// silent infinite recursion.
    #[error("reentrant dispatch of event kind '{0}'")]
    ReentrantDispatch(String),

    /// The event kind was never declared.
    #[error("unknown event kind '{0}'")]
    UnknownKind(String),

    /// The supplied payload does not match the kind's declaration.
    #[error("dispatch payload mismatch on '{kind}': kind declares {expected}")]
    PayloadMismatch {
        /// The dispatched kind.
        kind: String,
        /// Payload type declared by the kind ("()" for marker kinds).
        expected: &'static str,
    },

    /// The catch-all pseudo-kind only receives forwarded dispatches.
    #[error("the catch-all kind cannot be dispatched directly")]
    CatchAllDispatch,
}
