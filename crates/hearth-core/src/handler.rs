//! Handler shapes and registration records.
//!
//! A handler binds one callable to one event kind under one of the shapes
//! below. The shape is chosen explicitly by the registering caller through
//! the [`Registration`] constructors; there is no signature inspection at
//! dispatch time, and a vetoable asynchronous shape does not exist by
//! construction.
//!
//! | Constructor | Runs | Returns |
//! |-------------|------|---------|
//! | [`Registration::sync`] | inline | `Result<(), BoxError>` |
//! | [`Registration::veto`] | inline | `Result<Flow, BoxError>` |
//! | [`Registration::task`] | spawned, private payload copy | `()` |
//! | [`Registration::observe`] | inline, catch-all only | `Result<(), BoxError>` |
//!
//! Marker variants (`*_marker`) exist for payload-less kinds.

use std::any::TypeId;
use std::fmt;
use std::future::Future;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::owner::ModuleId;
use crate::payload::Payload;

/// Boxed error type carried by handler results.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A vetoable handler's propagation decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Let the remaining handlers (and the catch-all forward) run.
    Continue,
    /// Stop iteration immediately and skip the catch-all forward.
    Halt,
}

/// Opaque handle to one accepted registration, usable for targeted removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(pub(crate) u64);

/// Type-erased callable, one variant per handler shape.
pub(crate) enum Callable {
    Sync(Box<dyn Fn(Option<&mut dyn Payload>) -> Result<(), BoxError> + Send + Sync>),
    Veto(Box<dyn Fn(Option<&mut dyn Payload>) -> Result<Flow, BoxError> + Send + Sync>),
    Task(Box<dyn Fn(Option<Box<dyn Payload>>) -> BoxFuture<'static, ()> + Send + Sync>),
    Observe(Box<dyn Fn(&str, Option<&mut dyn Payload>) -> Result<(), BoxError> + Send + Sync>),
}

impl Callable {
    pub(crate) fn shape_name(&self) -> &'static str {
        match self {
            Callable::Sync(_) => "sync",
            Callable::Veto(_) => "veto",
            Callable::Task(_) => "task",
            Callable::Observe(_) => "observe",
        }
    }
}

fn payload_slot<'a, P: Payload>(
    slot: Option<&'a mut dyn Payload>,
) -> Result<&'a mut P, BoxError> {
    slot.and_then(|p| p.as_any_mut().downcast_mut::<P>())
        .ok_or_else(|| "payload type changed between registration and dispatch".into())
}

/// A pending handler registration: callable, shape, priority, and owner.
///
/// Built with one of the shape constructors, then customised with
/// [`priority`](Self::priority) and [`owner`](Self::owner) before being
/// handed to [`EventEngine::register`](crate::EventEngine::register).
///
/// # Example
///
/// ```rust,ignore
/// engine.register(
///     "player-damaged",
///     Registration::veto(|p: &mut DamagePayload| {
///         Ok(if p.amount > 100 { Flow::Halt } else { Flow::Continue })
///     })
///     .priority(10)
///     .owner(module_id),
/// )?;
/// ```
pub struct Registration {
    pub(crate) priority: i32,
    pub(crate) owner: Option<ModuleId>,
    pub(crate) callable: Callable,
    pub(crate) payload: Option<TypeId>,
    pub(crate) payload_name: &'static str,
}

impl Registration {
    fn with(callable: Callable, payload: Option<TypeId>, payload_name: &'static str) -> Self {
        Self {
            priority: 0,
            owner: None,
            callable,
            payload,
            payload_name,
        }
    }

    /// Fire-and-forget synchronous handler for a payload-bearing kind.
    pub fn sync<P, F>(f: F) -> Self
    where
        P: Payload,
        F: Fn(&mut P) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self::with(
            Callable::Sync(Box::new(move |slot| f(payload_slot::<P>(slot)?))),
            Some(TypeId::of::<P>()),
            std::any::type_name::<P>(),
        )
    }

    /// Vetoable synchronous handler for a payload-bearing kind.
    ///
    /// Returning [`Flow::Halt`] stops the remaining handlers and suppresses
    /// the catch-all forward for this dispatch. A handler that fails instead
    /// of producing a decision counts as [`Flow::Continue`].
    pub fn veto<P, F>(f: F) -> Self
    where
        P: Payload,
        F: Fn(&mut P) -> Result<Flow, BoxError> + Send + Sync + 'static,
    {
        Self::with(
            Callable::Veto(Box::new(move |slot| f(payload_slot::<P>(slot)?))),
            Some(TypeId::of::<P>()),
            std::any::type_name::<P>(),
        )
    }

    /// Fire-and-forget asynchronous handler for a payload-bearing kind.
    ///
    /// The handler is spawned onto the ambient tokio runtime with its own
    /// deep copy of the payload; the dispatch never waits for it, and its
    /// failure never affects the synchronous iteration.
    pub fn task<P, F, Fut>(f: F) -> Self
    where
        P: Payload,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::with(
            Callable::Task(Box::new(move |copy| {
                match copy.and_then(|c| c.into_any().downcast::<P>().ok()) {
                    Some(p) => f(*p).boxed(),
                    None => futures::future::ready(()).boxed(),
                }
            })),
            Some(TypeId::of::<P>()),
            std::any::type_name::<P>(),
        )
    }

    /// Fire-and-forget synchronous handler for a marker (payload-less) kind.
    pub fn sync_marker<F>(f: F) -> Self
    where
        F: Fn() -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self::with(Callable::Sync(Box::new(move |_| f())), None, "()")
    }

    /// Vetoable synchronous handler for a marker kind.
    pub fn veto_marker<F>(f: F) -> Self
    where
        F: Fn() -> Result<Flow, BoxError> + Send + Sync + 'static,
    {
        Self::with(Callable::Veto(Box::new(move |_| f())), None, "()")
    }

    /// Fire-and-forget asynchronous handler for a marker kind.
    pub fn task_marker<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::with(Callable::Task(Box::new(move |_| f().boxed())), None, "()")
    }

    /// Catch-all subscription: receives the originating kind name and the
    /// shared payload (if any) of every forwarded dispatch.
    ///
    /// Only valid on [`ANY_KIND`](crate::ANY_KIND).
    pub fn observe<F>(f: F) -> Self
    where
        F: Fn(&str, Option<&mut dyn Payload>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self::with(Callable::Observe(Box::new(f)), None, "()")
    }

    /// Sets the dispatch priority (higher runs earlier; default 0).
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Binds the registration to an owning module.
    ///
    /// Owned registrations are skipped while the owner is not enabled and
    /// are stripped when the owner is disposed. Host-internal subscriptions
    /// simply leave the owner unset.
    pub fn owner(mut self, owner: ModuleId) -> Self {
        self.owner = Some(owner);
        self
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("shape", &self.callable.shape_name())
            .field("priority", &self.priority)
            .field("owner", &self.owner)
            .field("payload", &self.payload_name)
            .finish()
    }
}

/// One accepted registration in a kind's ordered set.
pub(crate) struct HandlerEntry {
    pub(crate) id: RegistrationId,
    pub(crate) owner: Option<ModuleId>,
    pub(crate) priority: i32,
    pub(crate) seq: u64,
    pub(crate) callable: Callable,
}
