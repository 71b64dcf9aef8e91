//! Event kind declarations.
//!
//! An event kind is a named category of occurrence ("round-started",
//! "player-damaged"). A kind optionally declares a payload type; the
//! declaration is what lets the engine reject mismatched handlers at
//! registration time instead of failing mid-dispatch.

use std::any::TypeId;
use std::collections::HashMap;

use crate::error::RegisterError;

/// The catch-all pseudo-kind.
///
/// Every dispatch of a concrete kind (outside [`FRAME_KINDS`]) is forwarded
/// here exactly once, unless a vetoable handler halted it. Only
/// observe-shaped handlers may subscribe, and the kind cannot be dispatched
/// directly.
pub const ANY_KIND: &str = "*";

/// High-frequency per-frame kinds excluded from catch-all forwarding.
pub const FRAME_KINDS: [&str; 3] = ["tick", "physics-tick", "late-tick"];

/// Declaration record for one event kind.
#[derive(Clone, Copy)]
pub(crate) struct KindInfo {
    /// Payload type id, or `None` for marker kinds.
    pub payload: Option<TypeId>,
    /// Human-readable payload type name for diagnostics ("()" for markers).
    pub payload_name: &'static str,
}

/// All declared kinds, including the pre-declared catch-all.
pub(crate) struct KindRegistry {
    kinds: HashMap<String, KindInfo>,
}

impl KindRegistry {
    pub(crate) fn new() -> Self {
        let mut kinds = HashMap::new();
        kinds.insert(
            ANY_KIND.to_string(),
            KindInfo {
                payload: None,
                payload_name: "()",
            },
        );
        Self { kinds }
    }

    /// Declares `kind`. Re-declaring with the identical payload type is a
    /// no-op; a differing payload type is rejected.
    pub(crate) fn declare(
        &mut self,
        kind: &str,
        payload: Option<TypeId>,
        payload_name: &'static str,
    ) -> Result<(), RegisterError> {
        match self.kinds.get(kind) {
            Some(existing) if existing.payload == payload => Ok(()),
            Some(existing) => Err(RegisterError::KindConflict {
                kind: kind.to_string(),
                existing: existing.payload_name,
                requested: payload_name,
            }),
            None => {
                self.kinds.insert(
                    kind.to_string(),
                    KindInfo {
                        payload,
                        payload_name,
                    },
                );
                Ok(())
            }
        }
    }

    pub(crate) fn get(&self, kind: &str) -> Option<KindInfo> {
        self.kinds.get(kind).copied()
    }
}
