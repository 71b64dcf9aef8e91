//! Payload model for payload-bearing event kinds.
//!
//! A [`Payload`] is the mutable record that accompanies one dispatch of a
//! payload-bearing event kind. Payloads are value-like and pooled: the host
//! resets and reuses the same instance across dispatches instead of
//! allocating a fresh record per occurrence. Two operations make that safe:
//!
//! - [`reset`](Payload::reset) returns the instance to its neutral default
//!   state between dispatches.
//! - [`clone_boxed`](Payload::clone_boxed) deep-copies the payload so that
//!   asynchronous handlers receive a private instance; the original may be
//!   mutated or recycled before the spawned handler ever runs.
//!
//! Handlers must never retain a payload reference beyond the call that
//! receives it; the fields may already describe a later, unrelated dispatch.
//!
//! For `Clone + Default` types the trait can be derived with
//! `#[derive(Payload)]` from `hearth-macros`.

use std::any::Any;

use parking_lot::Mutex;

/// A mutable, poolable record carried by one event dispatch.
pub trait Payload: Any + Send + Sync {
    /// Returns this instance to its neutral default state for reuse.
    fn reset(&mut self);

    /// Deep-copies the payload into a fresh boxed instance.
    ///
    /// Used by the engine to hand asynchronous handlers a private copy.
    fn clone_boxed(&self) -> Box<dyn Payload>;

    /// Upcast for downcasting to the concrete payload type.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete payload type.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Consuming upcast, used when an owned copy changes hands.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

/// A reuse pool for payload instances of one type.
///
/// [`acquire`](Self::acquire) hands out an instance in its neutral state;
/// [`release`](Self::release) resets the instance and stores it for the next
/// dispatch. The pool never shrinks on its own.
///
/// # Example
///
/// ```rust,ignore
/// let pool: PayloadPool<DamagePayload> = PayloadPool::new();
/// let mut payload = pool.acquire();
/// payload.amount = 12;
/// engine.dispatch("player-damaged", &mut payload)?;
/// pool.release(payload);
/// ```
pub struct PayloadPool<P> {
    free: Mutex<Vec<P>>,
}

impl<P: Payload + Default> PayloadPool<P> {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self {
            free: Mutex::new(Vec::new()),
        }
    }

    /// Takes a pooled instance, or constructs a fresh default one.
    pub fn acquire(&self) -> P {
        self.free.lock().pop().unwrap_or_default()
    }

    /// Resets `payload` and returns it to the pool.
    pub fn release(&self, mut payload: P) {
        payload.reset();
        self.free.lock().push(payload);
    }

    /// Number of idle instances currently held.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }
}

impl<P: Payload + Default> Default for PayloadPool<P> {
    fn default() -> Self {
        Self::new()
    }
}
