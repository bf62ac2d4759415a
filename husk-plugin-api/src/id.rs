//! 128-bit interface identifiers

/// Identifier under which a host service is published in the interface
/// registry.
///
/// The value is opaque to the host: uniqueness is the publisher's problem, and
/// the registry never deduplicates. Stored as two 64-bit halves so the type
/// stays a plain `#[repr(C)]` pair on every platform.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterfaceId {
    pub hi: u64,
    pub lo: u64,
}

impl InterfaceId {
    /// Build an identifier from its two halves.
    pub const fn new(hi: u64, lo: u64) -> Self {
        Self { hi, lo }
    }
}

/// Well-known identifiers for the interfaces the host itself publishes.
pub mod ids {
    use super::InterfaceId;

    /// The graphics lifecycle interface ([`crate::GraphicsInterface`]).
    pub const GRAPHICS: InterfaceId =
        InterfaceId::new(0x7CBA_0A9C_A4DD_B544, 0x8C5A_D492_6EB1_7B11);

    /// The Vulkan interop interface ([`crate::VulkanInterface`]).
    /// Published only when the host is configured for a Vulkan renderer.
    pub const GRAPHICS_VULKAN: InterfaceId =
        InterfaceId::new(0x9535_5348_D4EF_4E11, 0x9789_313D_FCFF_CC87);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_id_equality_is_structural() {
        let a = InterfaceId::new(1, 2);
        let b = InterfaceId::new(1, 2);
        let c = InterfaceId::new(2, 1);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_well_known_ids_are_distinct() {
        assert_ne!(ids::GRAPHICS, ids::GRAPHICS_VULKAN);
    }
}
