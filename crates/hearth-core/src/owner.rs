//! Handler ownership: module identity and the enabled-state gate.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Case-insensitive identifier of a loaded module.
///
/// Equality, hashing, and ordering ignore ASCII case, while the original
/// spelling is preserved for display. Cloning is cheap (`Arc<str>`).
#[derive(Clone, Debug)]
pub struct ModuleId(Arc<str>);

impl ModuleId {
    /// Creates an id from any string-like value.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// The id exactly as originally spelled.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for ModuleId {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for ModuleId {}

impl PartialOrd for ModuleId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ModuleId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        let lhs = self.0.bytes().map(|b| b.to_ascii_lowercase());
        let rhs = other.0.bytes().map(|b| b.to_ascii_lowercase());
        lhs.cmp(rhs)
    }
}

impl Hash for ModuleId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.0.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
        state.write_u8(0xff);
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Answers whether a handler's owning module is currently enabled.
///
/// The module lifecycle manager implements this and installs it into the
/// engine; during dispatch, handlers whose owner is not enabled are skipped
/// with a logged warning instead of being invoked.
pub trait OwnerGate: Send + Sync {
    /// `true` if the module identified by `owner` is in the Enabled state.
    fn owner_enabled(&self, owner: &ModuleId) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_compare_case_insensitively() {
        assert_eq!(ModuleId::new("DoorGuard"), ModuleId::new("doorguard"));
        assert_ne!(ModuleId::new("door-guard"), ModuleId::new("doorguard"));
    }

    #[test]
    fn hashing_matches_equality() {
        let mut set = HashSet::new();
        set.insert(ModuleId::new("Round-Logger"));
        assert!(set.contains(&ModuleId::new("round-logger")));
    }

    #[test]
    fn display_preserves_original_spelling() {
        assert_eq!(ModuleId::new("DoorGuard").to_string(), "DoorGuard");
    }
}
