//! Interface registry - the host's service locator
//!
//! Maps 128-bit [`InterfaceId`]s to opaque interface pointers. Both the host
//! (at construction) and loaded plugins (through the ABI surface) publish
//! entries here; plugins discover every host capability by looking them up.

use std::ffi::c_void;

use husk_plugin_api::InterfaceId;

struct InterfaceEntry {
    id: InterfaceId,
    interface: *mut c_void,
}

/// Append-only registry of published interfaces.
///
/// Registration never deduplicates and lookup returns the first structural
/// match, so registering a second interface under an id that is already taken
/// creates a shadowed, unreachable entry. That quirk is part of the emulated
/// host's contract and is preserved rather than corrected.
///
/// The registry does not own what the pointers refer to; publishers must keep
/// their interfaces alive for the life of the host.
#[derive(Default)]
pub struct InterfaceRegistry {
    entries: Vec<InterfaceEntry>,
}

impl InterfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `interface` under `id`. Amortized O(1); growth preserves the
    /// order of existing entries.
    pub fn register(&mut self, id: InterfaceId, interface: *mut c_void) {
        self.entries.push(InterfaceEntry { id, interface });
    }

    /// Linear scan for the first entry registered under `id`. O(n), which is
    /// fine for the handful of interfaces a host ever carries.
    pub fn lookup(&self, id: InterfaceId) -> Option<*mut c_void> {
        self.entries
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.interface)
    }

    /// Number of registered entries, shadowed ones included.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> InterfaceId {
        InterfaceId::new(n, n.wrapping_mul(31))
    }

    fn ptr(n: usize) -> *mut c_void {
        n as *mut c_void
    }

    #[test]
    fn test_lookup_miss_returns_none() {
        let registry = InterfaceRegistry::new();
        assert_eq!(registry.lookup(id(1)), None);
    }

    #[test]
    fn test_register_then_lookup() {
        let mut registry = InterfaceRegistry::new();
        registry.register(id(1), ptr(0x10));
        assert_eq!(registry.lookup(id(1)), Some(ptr(0x10)));
    }

    #[test]
    fn test_duplicate_registration_is_shadowed() {
        let mut registry = InterfaceRegistry::new();
        registry.register(id(7), ptr(0xa));
        registry.register(id(7), ptr(0xb));
        // First match wins; the second entry is unreachable.
        assert_eq!(registry.lookup(id(7)), Some(ptr(0xa)));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_lookup_survives_growth() {
        let mut registry = InterfaceRegistry::new();
        for n in 0..100u64 {
            registry.register(id(n), ptr(n as usize + 1));
        }
        for n in 0..100u64 {
            assert_eq!(registry.lookup(id(n)), Some(ptr(n as usize + 1)));
        }
    }

    #[test]
    fn test_ids_match_structurally_not_by_half() {
        let mut registry = InterfaceRegistry::new();
        registry.register(InterfaceId::new(1, 2), ptr(0x1));
        assert_eq!(registry.lookup(InterfaceId::new(1, 3)), None);
        assert_eq!(registry.lookup(InterfaceId::new(2, 2)), None);
        assert_eq!(registry.lookup(InterfaceId::new(1, 2)), Some(ptr(0x1)));
    }
}
