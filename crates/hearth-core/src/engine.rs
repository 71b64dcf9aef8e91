//! The event dispatch engine.
//!
//! Dispatch is synchronous and sequential: handlers for a kind run in
//! descending priority order (registration order breaks ties) on the calling
//! thread, sharing one mutable payload. Task-shaped handlers are the only
//! concession to concurrency, and they run on a private payload copy.
//!
//! A handler that fails or panics is logged and skipped; it cannot abort the
//! delivery pass or poison the engine. The only errors a dispatch call itself
//! returns describe host-side misuse (undeclared kind, wrong payload type,
//! reentrant dispatch, dispatching the catch-all directly).

use std::any::TypeId;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::error::{DispatchError, RegisterError};
use crate::handler::{Callable, Flow, HandlerEntry, Registration, RegistrationId};
use crate::kind::{ANY_KIND, FRAME_KINDS, KindRegistry};
use crate::owner::{ModuleId, OwnerGate};
use crate::payload::Payload;

/// What one dispatch pass did.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchOutcome {
    /// Handlers actually invoked during the main pass (skipped and spawned
    /// handlers both count once their callable was reached).
    pub invoked: usize,
    /// A vetoable handler halted propagation.
    pub vetoed: bool,
    /// The dispatch was forwarded to catch-all subscribers.
    pub forwarded: bool,
}

/// Priority-ordered, vetoable event dispatcher with failure isolation.
///
/// The engine owns the kind declarations and the handler sets; the module
/// host layers lifecycle semantics on top through owned registrations and an
/// installed [`OwnerGate`].
pub struct EventEngine {
    kinds: RwLock<KindRegistry>,
    handlers: RwLock<HashMap<String, Vec<Arc<HandlerEntry>>>>,
    next_seq: AtomicU64,
    active: Mutex<Vec<String>>,
    gate: RwLock<Option<Arc<dyn OwnerGate>>>,
}

impl EventEngine {
    /// Creates an engine with no declared kinds (the catch-all is implicit).
    pub fn new() -> Self {
        Self {
            kinds: RwLock::new(KindRegistry::new()),
            handlers: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
            active: Mutex::new(Vec::new()),
            gate: RwLock::new(None),
        }
    }

    /// Installs the gate consulted for owned handlers during dispatch.
    pub fn set_owner_gate(&self, gate: Arc<dyn OwnerGate>) {
        *self.gate.write() = Some(gate);
    }

    /// Declares a payload-bearing event kind.
    ///
    /// Re-declaring with the same payload type is a no-op, so independent
    /// modules may both declare the kinds they use.
    pub fn declare<P: Payload>(&self, kind: &str) -> Result<(), RegisterError> {
        self.kinds
            .write()
            .declare(kind, Some(TypeId::of::<P>()), std::any::type_name::<P>())
    }

    /// Declares a marker (payload-less) event kind.
    pub fn declare_marker(&self, kind: &str) -> Result<(), RegisterError> {
        self.kinds.write().declare(kind, None, "()")
    }

    /// Registers a handler for `kind`.
    ///
    /// The registration is validated against the kind's declaration before it
    /// is accepted; nothing about a successful registration can fail at
    /// dispatch time short of handler misbehavior. Registrations made while a
    /// dispatch of the same kind is in flight take effect from the next
    /// dispatch.
    pub fn register(
        &self,
        kind: &str,
        registration: Registration,
    ) -> Result<RegistrationId, RegisterError> {
        let observe = matches!(registration.callable, Callable::Observe(_));
        if kind == ANY_KIND {
            if !observe {
                return Err(RegisterError::ObserveShapeRequired);
            }
        } else {
            if observe {
                return Err(RegisterError::ObserveOnConcreteKind);
            }
            let info = self
                .kinds
                .read()
                .get(kind)
                .ok_or_else(|| RegisterError::UnknownKind(kind.to_string()))?;
            if info.payload != registration.payload {
                return Err(RegisterError::PayloadMismatch {
                    kind: kind.to_string(),
                    expected: info.payload_name,
                    got: registration.payload_name,
                });
            }
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let entry = Arc::new(HandlerEntry {
            id: RegistrationId(seq),
            owner: registration.owner,
            priority: registration.priority,
            seq,
            callable: registration.callable,
        });

        let mut handlers = self.handlers.write();
        let list = handlers.entry(kind.to_string()).or_default();
        // Descending priority; equal priorities keep registration order.
        let pos = list
            .iter()
            .position(|e| e.priority < entry.priority)
            .unwrap_or(list.len());
        list.insert(pos, entry);
        Ok(RegistrationId(seq))
    }

    /// Removes one registration. Returns `false` if the id is unknown.
    pub fn unregister(&self, id: RegistrationId) -> bool {
        let mut handlers = self.handlers.write();
        for list in handlers.values_mut() {
            if let Some(pos) = list.iter().position(|e| e.id == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Strips every registration owned by `owner`, across all kinds.
    ///
    /// Called by the host when a module is disposed. Returns the number of
    /// registrations removed.
    pub fn remove_owned_by(&self, owner: &ModuleId) -> usize {
        let mut removed = 0;
        let mut handlers = self.handlers.write();
        for list in handlers.values_mut() {
            let before = list.len();
            list.retain(|e| e.owner.as_ref() != Some(owner));
            removed += before - list.len();
        }
        removed
    }

    /// Strips every registration that has no owner, across all kinds.
    ///
    /// The unowned registrations are the host's own subscriptions (catch-all
    /// taps and other built-ins); module-owned handlers are untouched.
    /// Returns the number of registrations removed.
    pub fn remove_unowned(&self) -> usize {
        let mut removed = 0;
        let mut handlers = self.handlers.write();
        for list in handlers.values_mut() {
            let before = list.len();
            list.retain(|e| e.owner.is_some());
            removed += before - list.len();
        }
        removed
    }

    /// Number of registrations currently held for `kind`.
    pub fn handler_count(&self, kind: &str) -> usize {
        self.handlers.read().get(kind).map_or(0, Vec::len)
    }

    /// Dispatches one occurrence of a payload-bearing kind.
    ///
    /// Runs the kind's handlers to completion (or until a veto) on the
    /// calling thread, then forwards to catch-all subscribers unless the
    /// dispatch was vetoed or `kind` is one of the per-frame kinds.
    pub fn dispatch(
        &self,
        kind: &str,
        payload: &mut dyn Payload,
    ) -> Result<DispatchOutcome, DispatchError> {
        self.check_dispatch(kind, Some(payload.as_any().type_id()))?;
        let _guard = self.enter(kind)?;
        Ok(self.run(kind, Some(payload)))
    }

    /// Dispatches one occurrence of a marker kind.
    pub fn dispatch_marker(&self, kind: &str) -> Result<DispatchOutcome, DispatchError> {
        self.check_dispatch(kind, None)?;
        let _guard = self.enter(kind)?;
        Ok(self.run(kind, None))
    }

    fn check_dispatch(&self, kind: &str, payload: Option<TypeId>) -> Result<(), DispatchError> {
        if kind == ANY_KIND {
            return Err(DispatchError::CatchAllDispatch);
        }
        let info = self
            .kinds
            .read()
            .get(kind)
            .ok_or_else(|| DispatchError::UnknownKind(kind.to_string()))?;
        if info.payload != payload {
            return Err(DispatchError::PayloadMismatch {
                kind: kind.to_string(),
                expected: info.payload_name,
            });
        }
        Ok(())
    }

    fn enter<'a>(&'a self, kind: &str) -> Result<ActiveGuard<'a>, DispatchError> {
        let mut active = self.active.lock();
        if active.iter().any(|k| k == kind) {
            return Err(DispatchError::ReentrantDispatch(kind.to_string()));
        }
        active.push(kind.to_string());
        Ok(ActiveGuard {
            engine: self,
            kind: kind.to_string(),
        })
    }

    fn snapshot(&self, kind: &str) -> Vec<Arc<HandlerEntry>> {
        self.handlers.read().get(kind).cloned().unwrap_or_default()
    }

    fn owner_blocked(&self, owner: Option<&ModuleId>) -> bool {
        match (owner, self.gate.read().as_ref()) {
            (Some(owner), Some(gate)) => !gate.owner_enabled(owner),
            _ => false,
        }
    }

    fn run(&self, kind: &str, mut payload: Option<&mut dyn Payload>) -> DispatchOutcome {
        let _span = tracing::debug_span!("dispatch", kind).entered();
        let mut outcome = DispatchOutcome::default();

        for entry in self.snapshot(kind) {
            if self.owner_blocked(entry.owner.as_ref()) {
                tracing::warn!(
                    "skipping handler for '{kind}': owner {:?} is not enabled",
                    entry.owner
                );
                continue;
            }
            let slot = payload.as_mut().map(|p| &mut **p);
            match &entry.callable {
                Callable::Sync(f) => {
                    outcome.invoked += 1;
                    match catch_unwind(AssertUnwindSafe(|| f(slot))) {
                        Ok(Ok(())) => {}
                        Ok(Err(err)) => self.report_error(kind, &entry, &err),
                        Err(panic) => self.report_panic(kind, &entry, panic.as_ref()),
                    }
                }
                Callable::Veto(f) => {
                    outcome.invoked += 1;
                    match catch_unwind(AssertUnwindSafe(|| f(slot))) {
                        Ok(Ok(Flow::Halt)) => {
                            outcome.vetoed = true;
                            break;
                        }
                        Ok(Ok(Flow::Continue)) => {}
                        // A failed veto handler produced no decision; treat
                        // it as Continue rather than silently halting.
                        Ok(Err(err)) => self.report_error(kind, &entry, &err),
                        Err(panic) => self.report_panic(kind, &entry, panic.as_ref()),
                    }
                }
                Callable::Task(f) => {
                    outcome.invoked += 1;
                    let copy = payload.as_ref().map(|p| p.clone_boxed());
                    match tokio::runtime::Handle::try_current() {
                        Ok(handle) => {
                            handle.spawn(f(copy));
                        }
                        Err(_) => tracing::error!(
                            "dropping task handler for '{kind}': no tokio runtime on this thread"
                        ),
                    }
                }
                Callable::Observe(_) => {
                    // register() confines observe handlers to the catch-all.
                    tracing::error!("observe handler found on concrete kind '{kind}'");
                }
            }
        }

        if !outcome.vetoed && !FRAME_KINDS.contains(&kind) {
            outcome.forwarded = self.forward(kind, payload);
        }
        outcome
    }

    /// Runs catch-all subscribers for an already-delivered dispatch.
    fn forward(&self, kind: &str, mut payload: Option<&mut dyn Payload>) -> bool {
        let snapshot = self.snapshot(ANY_KIND);
        for entry in &snapshot {
            if self.owner_blocked(entry.owner.as_ref()) {
                tracing::warn!(
                    "skipping catch-all handler: owner {:?} is not enabled",
                    entry.owner
                );
                continue;
            }
            if let Callable::Observe(f) = &entry.callable {
                let slot = payload.as_mut().map(|p| &mut **p);
                match catch_unwind(AssertUnwindSafe(|| f(kind, slot))) {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => self.report_error(ANY_KIND, entry, &err),
                    Err(panic) => self.report_panic(ANY_KIND, entry, panic.as_ref()),
                }
            }
        }
        !snapshot.is_empty()
    }

    fn report_error(
        &self,
        kind: &str,
        entry: &HandlerEntry,
        err: &crate::handler::BoxError,
    ) {
        tracing::error!(
            "{} handler for '{kind}' (owner {:?}) failed: {err}",
            entry.callable.shape_name(),
            entry.owner
        );
    }

    fn report_panic(
        &self,
        kind: &str,
        entry: &HandlerEntry,
        panic: &(dyn std::any::Any + Send),
    ) {
        let message = panic
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("<opaque panic payload>");
        tracing::error!(
            "{} handler for '{kind}' (owner {:?}) panicked: {message}",
            entry.callable.shape_name(),
            entry.owner
        );
    }
}

impl Default for EventEngine {
    fn default() -> Self {
        Self::new()
    }
}

struct ActiveGuard<'a> {
    engine: &'a EventEngine,
    kind: String,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        // Remove this guard's own kind. Dispatches of different kinds may
        // overlap across threads, so the stack top is not necessarily ours.
        let mut active = self.engine.active.lock();
        if let Some(pos) = active.iter().position(|k| *k == self.kind) {
            active.remove(pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::BoxError;
    use std::any::Any;
    use std::sync::atomic::AtomicUsize;

    #[derive(Clone, Default, Debug, PartialEq)]
    struct Damage {
        amount: u32,
    }

    impl Payload for Damage {
        fn reset(&mut self) {
            *self = Self::default();
        }
        fn clone_boxed(&self) -> Box<dyn Payload> {
            Box::new(self.clone())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
        fn into_any(self: Box<Self>) -> Box<dyn Any> {
            self
        }
    }

    fn trace() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str)) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let writer = {
            let log = log.clone();
            move |tag| log.lock().push(tag)
        };
        (log, writer)
    }

    #[test]
    fn handlers_run_in_priority_order_with_stable_ties() {
        let engine = EventEngine::new();
        engine.declare_marker("round-started").unwrap();
        let (log, _) = trace();

        for (tag, priority) in [("low", -5), ("first-tie", 0), ("second-tie", 0), ("high", 10)] {
            let log = log.clone();
            engine
                .register(
                    "round-started",
                    Registration::sync_marker(move || {
                        log.lock().push(tag);
                        Ok(())
                    })
                    .priority(priority),
                )
                .unwrap();
        }

        let outcome = engine.dispatch_marker("round-started").unwrap();
        assert_eq!(outcome.invoked, 4);
        assert_eq!(*log.lock(), vec!["high", "first-tie", "second-tie", "low"]);
    }

    #[test]
    fn veto_halts_remaining_handlers_and_forwarding() {
        let engine = EventEngine::new();
        engine.declare::<Damage>("player-damaged").unwrap();
        let (log, _) = trace();

        {
            let log = log.clone();
            engine
                .register(
                    "*",
                    Registration::observe(move |kind, _| {
                        assert_eq!(kind, "player-damaged");
                        log.lock().push("observed");
                        Ok(())
                    }),
                )
                .unwrap();
        }
        engine
            .register(
                "player-damaged",
                Registration::veto(|p: &mut Damage| {
                    Ok(if p.amount > 100 { Flow::Halt } else { Flow::Continue })
                })
                .priority(10),
            )
            .unwrap();
        {
            let log = log.clone();
            engine
                .register(
                    "player-damaged",
                    Registration::sync(move |_: &mut Damage| {
                        log.lock().push("applied");
                        Ok(())
                    }),
                )
                .unwrap();
        }

        let mut lethal = Damage { amount: 250 };
        let outcome = engine.dispatch("player-damaged", &mut lethal).unwrap();
        assert!(outcome.vetoed);
        assert!(!outcome.forwarded);
        assert!(log.lock().is_empty());

        let mut scratch = Damage { amount: 3 };
        let outcome = engine.dispatch("player-damaged", &mut scratch).unwrap();
        assert!(!outcome.vetoed);
        assert!(outcome.forwarded);
        assert_eq!(*log.lock(), vec!["applied", "observed"]);
    }

    #[test]
    fn failed_veto_counts_as_continue() {
        let engine = EventEngine::new();
        engine.declare_marker("door-opened").unwrap();
        let ran = Arc::new(AtomicUsize::new(0));

        engine
            .register(
                "door-opened",
                Registration::veto_marker(|| Err("gate jammed".into())).priority(5),
            )
            .unwrap();
        {
            let ran = ran.clone();
            engine
                .register(
                    "door-opened",
                    Registration::sync_marker(move || {
                        ran.fetch_add(1, Ordering::Relaxed);
                        Ok(())
                    }),
                )
                .unwrap();
        }

        let outcome = engine.dispatch_marker("door-opened").unwrap();
        assert!(!outcome.vetoed);
        assert_eq!(ran.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn handler_failure_and_panic_are_isolated() {
        let engine = EventEngine::new();
        engine.declare::<Damage>("player-damaged").unwrap();
        let ran = Arc::new(AtomicUsize::new(0));

        engine
            .register(
                "player-damaged",
                Registration::sync(|_: &mut Damage| Err("boom".into())).priority(2),
            )
            .unwrap();
        engine
            .register(
                "player-damaged",
                Registration::sync(|_: &mut Damage| -> Result<(), BoxError> {
                    panic!("handler bug")
                })
                .priority(1),
            )
            .unwrap();
        {
            let ran = ran.clone();
            engine
                .register(
                    "player-damaged",
                    Registration::sync(move |p: &mut Damage| {
                        p.amount += 1;
                        ran.fetch_add(1, Ordering::Relaxed);
                        Ok(())
                    }),
                )
                .unwrap();
        }

        let mut payload = Damage { amount: 0 };
        let outcome = engine.dispatch("player-damaged", &mut payload).unwrap();
        assert_eq!(outcome.invoked, 3);
        assert_eq!(payload.amount, 1);
        assert_eq!(ran.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn reentrant_dispatch_of_same_kind_is_rejected() {
        let engine = Arc::new(EventEngine::new());
        engine.declare_marker("round-started").unwrap();
        let seen = Arc::new(Mutex::new(None));

        {
            let engine = engine.clone();
            let seen = seen.clone();
            engine
                .clone()
                .register(
                    "round-started",
                    Registration::sync_marker(move || {
                        *seen.lock() = Some(engine.dispatch_marker("round-started"));
                        Ok(())
                    }),
                )
                .unwrap();
        }

        engine.dispatch_marker("round-started").unwrap();
        assert!(matches!(
            seen.lock().take(),
            Some(Err(DispatchError::ReentrantDispatch(_)))
        ));
    }

    #[test]
    fn nested_dispatch_of_a_different_kind_is_allowed() {
        let engine = Arc::new(EventEngine::new());
        engine.declare_marker("round-started").unwrap();
        engine.declare_marker("door-opened").unwrap();
        let (log, _) = trace();

        {
            let log = log.clone();
            engine
                .register(
                    "door-opened",
                    Registration::sync_marker(move || {
                        log.lock().push("inner");
                        Ok(())
                    }),
                )
                .unwrap();
        }
        {
            let engine = engine.clone();
            let log = log.clone();
            engine
                .clone()
                .register(
                    "round-started",
                    Registration::sync_marker(move || {
                        engine.dispatch_marker("door-opened")?;
                        log.lock().push("outer");
                        Ok(())
                    }),
                )
                .unwrap();
        }

        engine.dispatch_marker("round-started").unwrap();
        assert_eq!(*log.lock(), vec!["inner", "outer"]);
    }

    #[test]
    fn overlapping_dispatches_release_only_their_own_kind() {
        use std::sync::Barrier;

        let engine = Arc::new(EventEngine::new());
        engine.declare_marker("round-started").unwrap();
        engine.declare_marker("door-opened").unwrap();
        let rendezvous = Arc::new(Barrier::new(2));

        // The door-opened handler keeps its dispatch open across a complete
        // round-started dispatch on another thread, then checks that
        // door-opened is still held as active.
        {
            let engine = engine.clone();
            let rendezvous = rendezvous.clone();
            engine
                .clone()
                .register(
                    "door-opened",
                    Registration::sync_marker(move || {
                        rendezvous.wait();
                        rendezvous.wait();
                        assert!(matches!(
                            engine.dispatch_marker("door-opened"),
                            Err(DispatchError::ReentrantDispatch(_))
                        ));
                        Ok(())
                    }),
                )
                .unwrap();
        }

        let other = {
            let engine = engine.clone();
            let rendezvous = rendezvous.clone();
            std::thread::spawn(move || {
                rendezvous.wait();
                engine.dispatch_marker("round-started").unwrap();
                rendezvous.wait();
            })
        };

        engine.dispatch_marker("door-opened").unwrap();
        other.join().unwrap();
    }

    #[test]
    fn frame_kinds_are_not_forwarded_to_catch_all() {
        let engine = EventEngine::new();
        engine.declare_marker("tick").unwrap();
        engine.declare_marker("round-started").unwrap();
        let (log, _) = trace();

        {
            let log = log.clone();
            engine
                .register(
                    "*",
                    Registration::observe(move |kind, _| {
                        assert_eq!(kind, "round-started");
                        log.lock().push("observed");
                        Ok(())
                    }),
                )
                .unwrap();
        }

        assert!(!engine.dispatch_marker("tick").unwrap().forwarded);
        assert!(engine.dispatch_marker("round-started").unwrap().forwarded);
        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn catch_all_rejects_non_observe_shapes_and_direct_dispatch() {
        let engine = EventEngine::new();
        assert!(matches!(
            engine.register("*", Registration::sync_marker(|| Ok(()))),
            Err(RegisterError::ObserveShapeRequired)
        ));
        engine.declare_marker("round-started").unwrap();
        assert!(matches!(
            engine.register("round-started", Registration::observe(|_, _| Ok(()))),
            Err(RegisterError::ObserveOnConcreteKind)
        ));
        assert!(matches!(
            engine.dispatch_marker("*"),
            Err(DispatchError::CatchAllDispatch)
        ));
    }

    #[test]
    fn declarations_are_validated() {
        let engine = EventEngine::new();
        engine.declare::<Damage>("player-damaged").unwrap();
        // Idempotent with the same payload type.
        engine.declare::<Damage>("player-damaged").unwrap();
        assert!(matches!(
            engine.declare_marker("player-damaged"),
            Err(RegisterError::KindConflict { .. })
        ));
        assert!(matches!(
            engine.register("player-damaged", Registration::sync_marker(|| Ok(()))),
            Err(RegisterError::PayloadMismatch { .. })
        ));
        assert!(matches!(
            engine.register("missing", Registration::sync_marker(|| Ok(()))),
            Err(RegisterError::UnknownKind(_))
        ));
        assert!(matches!(
            engine.dispatch_marker("missing"),
            Err(DispatchError::UnknownKind(_))
        ));
    }

    #[test]
    fn unregister_and_owner_removal() {
        let engine = EventEngine::new();
        engine.declare_marker("round-started").unwrap();
        let owner = ModuleId::new("Round-Logger");

        let kept = engine
            .register("round-started", Registration::sync_marker(|| Ok(())))
            .unwrap();
        engine
            .register(
                "round-started",
                Registration::sync_marker(|| Ok(())).owner(owner.clone()),
            )
            .unwrap();
        engine
            .register(
                "*",
                Registration::observe(|_, _| Ok(())).owner(ModuleId::new("round-logger")),
            )
            .unwrap();

        assert_eq!(engine.remove_owned_by(&owner), 2);
        assert_eq!(engine.handler_count("round-started"), 1);
        assert!(engine.unregister(kept));
        assert!(!engine.unregister(kept));
        assert_eq!(engine.handler_count("round-started"), 0);
    }

    #[test]
    fn unowned_registrations_can_be_stripped_together() {
        let engine = EventEngine::new();
        engine.declare_marker("round-started").unwrap();

        engine
            .register("round-started", Registration::sync_marker(|| Ok(())))
            .unwrap();
        engine
            .register("*", Registration::observe(|_, _| Ok(())))
            .unwrap();
        engine
            .register(
                "round-started",
                Registration::sync_marker(|| Ok(())).owner(ModuleId::new("round-logger")),
            )
            .unwrap();

        assert_eq!(engine.remove_unowned(), 2);
        assert_eq!(engine.handler_count("round-started"), 1);
        assert_eq!(engine.handler_count("*"), 0);
        assert_eq!(engine.remove_unowned(), 0);
    }

    #[test]
    fn registration_during_dispatch_applies_next_time() {
        let engine = Arc::new(EventEngine::new());
        engine.declare_marker("round-started").unwrap();
        let ran = Arc::new(AtomicUsize::new(0));

        {
            let engine = engine.clone();
            let ran = ran.clone();
            engine
                .clone()
                .register(
                    "round-started",
                    Registration::sync_marker(move || {
                        let ran = ran.clone();
                        engine.register(
                            "round-started",
                            Registration::sync_marker(move || {
                                ran.fetch_add(1, Ordering::Relaxed);
                                Ok(())
                            })
                            .priority(100),
                        )?;
                        Ok(())
                    }),
                )
                .unwrap();
        }

        assert_eq!(engine.dispatch_marker("round-started").unwrap().invoked, 1);
        assert_eq!(ran.load(Ordering::Relaxed), 0);
        assert_eq!(engine.dispatch_marker("round-started").unwrap().invoked, 2);
        assert_eq!(ran.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn gated_owners_are_skipped() {
        struct FixedGate(bool);
        impl OwnerGate for FixedGate {
            fn owner_enabled(&self, _: &ModuleId) -> bool {
                self.0
            }
        }

        let engine = EventEngine::new();
        engine.declare_marker("round-started").unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        {
            let ran = ran.clone();
            engine
                .register(
                    "round-started",
                    Registration::sync_marker(move || {
                        ran.fetch_add(1, Ordering::Relaxed);
                        Ok(())
                    })
                    .owner(ModuleId::new("door-guard")),
                )
                .unwrap();
        }

        engine.set_owner_gate(Arc::new(FixedGate(false)));
        engine.dispatch_marker("round-started").unwrap();
        assert_eq!(ran.load(Ordering::Relaxed), 0);

        engine.set_owner_gate(Arc::new(FixedGate(true)));
        engine.dispatch_marker("round-started").unwrap();
        assert_eq!(ran.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn task_handlers_get_a_private_payload_copy() {
        let engine = EventEngine::new();
        engine.declare::<Damage>("player-damaged").unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        engine
            .register(
                "player-damaged",
                Registration::task(move |p: Damage| {
                    let tx = tx.clone();
                    async move {
                        let _ = tx.send(p.amount);
                    }
                }),
            )
            .unwrap();

        let mut payload = Damage { amount: 42 };
        engine.dispatch("player-damaged", &mut payload).unwrap();
        // Mutating the shared payload after dispatch must not leak into the
        // spawned handler's copy.
        payload.amount = 0;

        assert_eq!(rx.recv().await, Some(42));
    }
}
