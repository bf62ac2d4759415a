//! husk-plugin-api - Host ABI for husk plugins
//!
//! This crate defines the C interface surface that husk emulates for native
//! engine plugins. It is shared by both sides of the boundary:
//!
//! - [`InterfaceId`]: 128-bit identifier under which host services are published
//! - [`HostInterfaces`]: the capability registry handed to a plugin's load hook
//! - [`GraphicsInterface`]: renderer queries and device-event callbacks
//! - [`VulkanInterface`]: Vulkan bootstrap interception
//! - [`vk`]: the minimal Vulkan FFI types the ABI traffics in
//!
//! Everything here is `#[repr(C)]` or a plain function pointer so that plugins
//! built as ordinary cdylibs can consume it without sharing a Rust toolchain
//! with the host.
//!
//! # Entry points
//!
//! A plugin exports up to two well-known symbols, both optional:
//!
//! ```ignore
//! #[unsafe(no_mangle)]
//! pub unsafe extern "C" fn husk_plugin_load(interfaces: *const HostInterfaces) {
//!     let interfaces = unsafe { &*interfaces };
//!     let graphics = unsafe { interfaces.lookup(ids::GRAPHICS) };
//!     // ...
//! }
//!
//! #[unsafe(no_mangle)]
//! pub unsafe extern "C" fn husk_plugin_unload() {}
//! ```
//!
//! The load hook receives the one pointer a plugin ever gets from the host;
//! every other capability is discovered through it.

pub mod id;
pub mod interfaces;
pub mod vk;

pub use id::{InterfaceId, ids};
pub use interfaces::{
    DeviceEvent, DeviceEventCallback, GraphicsInterface, HostInterfaces, PluginLoadFn,
    PluginUnloadFn, RendererKind, VulkanInitCallback, VulkanInterface,
};

/// Current host ABI version. Bumped whenever any `#[repr(C)]` layout changes.
pub const HOST_ABI_VERSION: u32 = 1;

/// Symbol name of the plugin load hook, resolved after the library is opened.
pub const PLUGIN_LOAD_SYMBOL: &str = "husk_plugin_load";

/// Symbol name of the plugin unload hook, resolved after the library is opened.
pub const PLUGIN_UNLOAD_SYMBOL: &str = "husk_plugin_unload";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abi_version_is_set() {
        assert_eq!(HOST_ABI_VERSION, 1);
    }

    #[test]
    fn test_entry_point_symbols() {
        assert_eq!(PLUGIN_LOAD_SYMBOL, "husk_plugin_load");
        assert_eq!(PLUGIN_UNLOAD_SYMBOL, "husk_plugin_unload");
    }
}
