//! The `#[repr(C)]` capability interfaces the host publishes to plugins
//!
//! Each interface is a function-pointer table with an explicit `host`
//! back-pointer as its first field. Plugins must pass that pointer back as the
//! first argument of every call; it stands in for the hidden global state a
//! real engine host would use, and keeps multiple host instances independent.

use core::ffi::c_void;

use crate::id::InterfaceId;
use crate::vk;

/// Signature of the `husk_plugin_load` entry point.
pub type PluginLoadFn = unsafe extern "C" fn(interfaces: *const HostInterfaces);

/// Signature of the `husk_plugin_unload` entry point.
pub type PluginUnloadFn = unsafe extern "C" fn();

/// Which graphics backend the host is running.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererKind {
    /// No graphics context exists (before bootstrap, or a headless host).
    None = 0,
    /// A Vulkan context is active.
    Vulkan = 1,
}

/// Graphics-context lifecycle transitions reported to device-event callbacks.
///
/// Hosts deliver [`DeviceEvent::Initialize`] when a context comes up and
/// [`DeviceEvent::Shutdown`] when it goes away. The reset pair is part of the
/// ABI so callback signatures stay stable when a backend that loses devices
/// is added.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    Initialize = 0,
    Shutdown = 1,
    BeforeReset = 2,
    AfterReset = 3,
}

/// Callback invoked synchronously on graphics-context lifecycle transitions.
pub type DeviceEventCallback = unsafe extern "C" fn(event: DeviceEvent);

/// Hook allowed to wrap or replace the root Vulkan resolver before the
/// bootstrap sequence resolves anything through it.
///
/// Returning `Some` substitutes the resolver for every subsequent stage;
/// returning `None` leaves the original in place.
pub type VulkanInitCallback = unsafe extern "system" fn(
    get_instance_proc_addr: vk::PfnGetInstanceProcAddr,
    userdata: *mut c_void,
) -> Option<vk::PfnGetInstanceProcAddr>;

/// The capability registry surface, passed to every plugin's load hook.
///
/// This is the plugin's sole way of discovering host services: look up a
/// [`InterfaceId`] and cast the returned pointer to the matching interface
/// struct. Plugins may also publish their own interfaces for other plugins to
/// find.
#[repr(C)]
pub struct HostInterfaces {
    /// Opaque host context. Pass as the first argument of every call.
    pub host: *mut c_void,
    /// Look up an interface. Returns null when nothing is registered under
    /// `id`; with duplicate registrations the first one wins.
    pub get_interface: unsafe extern "C" fn(host: *mut c_void, id: InterfaceId) -> *mut c_void,
    /// Publish an interface pointer under `id`. The pointer must stay valid
    /// for the life of the host.
    pub register_interface:
        unsafe extern "C" fn(host: *mut c_void, id: InterfaceId, interface: *mut c_void),
}

impl HostInterfaces {
    /// Look up an interface by id.
    ///
    /// # Safety
    ///
    /// `self.host` must be the live host this table was created by.
    pub unsafe fn lookup(&self, id: InterfaceId) -> *mut c_void {
        unsafe { (self.get_interface)(self.host, id) }
    }

    /// Publish an interface pointer under `id`.
    ///
    /// # Safety
    ///
    /// `self.host` must be live and `interface` must outlive the host.
    pub unsafe fn publish(&self, id: InterfaceId, interface: *mut c_void) {
        unsafe { (self.register_interface)(self.host, id, interface) }
    }
}

/// Graphics lifecycle surface, published under [`crate::ids::GRAPHICS`].
#[repr(C)]
pub struct GraphicsInterface {
    /// Opaque host context. Pass as the first argument of every call.
    pub host: *mut c_void,
    /// Which backend is currently active.
    pub get_renderer: unsafe extern "C" fn(host: *mut c_void) -> RendererKind,
    /// Register a device-event callback. Duplicates are allowed and all fire.
    pub register_device_event_callback:
        unsafe extern "C" fn(host: *mut c_void, callback: DeviceEventCallback),
    /// Remove the first matching registration of `callback`.
    pub unregister_device_event_callback:
        unsafe extern "C" fn(host: *mut c_void, callback: DeviceEventCallback),
}

impl GraphicsInterface {
    /// Query the active renderer kind.
    ///
    /// # Safety
    ///
    /// `self.host` must be the live host this table was created by.
    pub unsafe fn renderer(&self) -> RendererKind {
        unsafe { (self.get_renderer)(self.host) }
    }

    /// Register a device-event callback.
    ///
    /// # Safety
    ///
    /// `self.host` must be live; `callback` must remain callable while
    /// registered.
    pub unsafe fn add_device_event_callback(&self, callback: DeviceEventCallback) {
        unsafe { (self.register_device_event_callback)(self.host, callback) }
    }

    /// Unregister a previously registered device-event callback.
    ///
    /// # Safety
    ///
    /// `self.host` must be the live host this table was created by.
    pub unsafe fn remove_device_event_callback(&self, callback: DeviceEventCallback) {
        unsafe { (self.unregister_device_event_callback)(self.host, callback) }
    }
}

/// Vulkan interop surface, published under [`crate::ids::GRAPHICS_VULKAN`].
#[repr(C)]
pub struct VulkanInterface {
    /// Opaque host context. Pass as the first argument of every call.
    pub host: *mut c_void,
    /// Register an interception hook for the Vulkan bootstrap. Single slot:
    /// the last registration before bootstrap wins, and it is called exactly
    /// once. Returns `true` if the hook was accepted.
    pub intercept_initialization: unsafe extern "C" fn(
        host: *mut c_void,
        callback: VulkanInitCallback,
        userdata: *mut c_void,
    ) -> bool,
}

impl VulkanInterface {
    /// Register a bootstrap interception hook.
    ///
    /// # Safety
    ///
    /// `self.host` must be live; `callback` must remain callable until the
    /// bootstrap has run.
    pub unsafe fn intercept(&self, callback: VulkanInitCallback, userdata: *mut c_void) -> bool {
        unsafe { (self.intercept_initialization)(self.host, callback, userdata) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renderer_kind_values_are_stable() {
        assert_eq!(RendererKind::None as i32, 0);
        assert_eq!(RendererKind::Vulkan as i32, 1);
    }

    #[test]
    fn test_device_event_values_are_stable() {
        assert_eq!(DeviceEvent::Initialize as i32, 0);
        assert_eq!(DeviceEvent::Shutdown as i32, 1);
        assert_eq!(DeviceEvent::BeforeReset as i32, 2);
        assert_eq!(DeviceEvent::AfterReset as i32, 3);
    }

    #[test]
    fn test_vtables_start_with_host_pointer() {
        // Plugins rely on `host` being the first field of every interface.
        assert_eq!(core::mem::offset_of!(HostInterfaces, host), 0);
        assert_eq!(core::mem::offset_of!(GraphicsInterface, host), 0);
        assert_eq!(core::mem::offset_of!(VulkanInterface, host), 0);
    }
}
