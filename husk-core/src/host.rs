//! The host object
//!
//! [`Host`] owns everything the emulated engine host holds for one instance:
//! the interface registry, the plugin handle table, the device-event callback
//! list, the single-slot bootstrap interception hook and the renderer state.
//! There is no hidden global - each `Host` is independent, so tests can run
//! several in parallel threads.
//!
//! The `#[repr(C)]` capability tables handed to plugins carry a back-pointer
//! to the boxed [`HostInner`]. The box gives the inner state a stable address
//! for as long as the `Host` value lives, and all mutable state sits behind
//! `RefCell`/`Cell` because a plugin's load hook re-enters the host through
//! the tables while the host is borrowed.

use std::cell::{Cell, RefCell};
use std::ffi::c_void;
use std::ptr;

use husk_plugin_api::{
    DeviceEvent, DeviceEventCallback, GraphicsInterface, HostInterfaces, InterfaceId, RendererKind,
    VulkanInitCallback, VulkanInterface, ids,
};

use crate::callbacks::DeviceEventCallbacks;
use crate::config::HostConfig;
use crate::error::PluginHostError;
use crate::handles::HandleTable;
use crate::loader::{LibraryLoader, SystemLoader};
use crate::plugins::LoadedModule;
use crate::registry::InterfaceRegistry;
use crate::vulkan::{RendererState, VulkanContext};

/// A registered bootstrap interception hook.
#[derive(Clone, Copy)]
pub(crate) struct InterceptHook {
    pub(crate) callback: VulkanInitCallback,
    pub(crate) userdata: *mut c_void,
}

/// The capability tables published to plugins. Stored inside the boxed
/// [`HostInner`] so their addresses are stable for the life of the host.
struct AbiTables {
    interfaces: HostInterfaces,
    graphics: GraphicsInterface,
    vulkan: VulkanInterface,
}

impl AbiTables {
    fn unbound() -> Self {
        Self {
            interfaces: HostInterfaces {
                host: ptr::null_mut(),
                get_interface: host_get_interface,
                register_interface: host_register_interface,
            },
            graphics: GraphicsInterface {
                host: ptr::null_mut(),
                get_renderer: host_get_renderer,
                register_device_event_callback: host_register_device_event_callback,
                unregister_device_event_callback: host_unregister_device_event_callback,
            },
            vulkan: VulkanInterface {
                host: ptr::null_mut(),
                intercept_initialization: host_intercept_initialization,
            },
        }
    }

    fn bind(&mut self, host: *mut c_void) {
        self.interfaces.host = host;
        self.graphics.host = host;
        self.vulkan.host = host;
    }
}

pub(crate) struct HostInner {
    pub(crate) config: HostConfig,
    pub(crate) registry: RefCell<InterfaceRegistry>,
    pub(crate) callbacks: RefCell<DeviceEventCallbacks>,
    pub(crate) modules: RefCell<HandleTable<LoadedModule>>,
    pub(crate) intercept: Cell<Option<InterceptHook>>,
    pub(crate) renderer: RefCell<RendererState>,
    pub(crate) loader: Box<dyn LibraryLoader>,
    abi: AbiTables,
}

/// One emulated engine host.
///
/// Single-threaded by contract: the type holds raw ABI pointers and is
/// deliberately neither `Send` nor `Sync`. One thread drives initialization,
/// plugin loading and the bootstrap to completion before any dependent
/// plugin code runs.
pub struct Host {
    pub(crate) inner: Box<HostInner>,
}

impl Host {
    /// Create a host backed by the platform dynamic linker.
    pub fn new(config: HostConfig) -> Result<Self, PluginHostError> {
        Self::with_loader(config, Box::new(SystemLoader::new()))
    }

    /// Create a host with a caller-supplied library loader (tests use
    /// [`crate::MockLoader`] here).
    pub fn with_loader(
        config: HostConfig,
        loader: Box<dyn LibraryLoader>,
    ) -> Result<Self, PluginHostError> {
        if config.renderer != RendererKind::Vulkan {
            return Err(PluginHostError::UnsupportedRenderer {
                kind: config.renderer,
            });
        }

        let max_plugins = config.max_plugins;
        let mut inner = Box::new(HostInner {
            config,
            registry: RefCell::new(InterfaceRegistry::new()),
            callbacks: RefCell::new(DeviceEventCallbacks::new()),
            modules: RefCell::new(HandleTable::with_capacity(max_plugins)),
            intercept: Cell::new(None),
            renderer: RefCell::new(RendererState::Inactive),
            loader,
            abi: AbiTables::unbound(),
        });

        // The box is the stable home of the inner state; bind the capability
        // tables to it before anything can observe them.
        let host_ptr = ptr::from_mut(&mut *inner).cast::<c_void>();
        inner.abi.bind(host_ptr);

        {
            let mut registry = inner.registry.borrow_mut();
            registry.register(
                ids::GRAPHICS,
                ptr::from_ref(&inner.abi.graphics).cast_mut().cast(),
            );
            registry.register(
                ids::GRAPHICS_VULKAN,
                ptr::from_ref(&inner.abi.vulkan).cast_mut().cast(),
            );
        }

        tracing::debug!(
            max_plugins = inner.modules.borrow().capacity(),
            "host initialized"
        );
        Ok(Self { inner })
    }

    /// The host's configuration.
    pub fn config(&self) -> &HostConfig {
        &self.inner.config
    }

    /// The capability table a plugin's load hook receives. Valid for the
    /// life of this host.
    pub fn interfaces(&self) -> *const HostInterfaces {
        ptr::from_ref(&self.inner.abi.interfaces)
    }

    /// Publish an interface, exactly as a plugin would through the ABI.
    pub fn register_interface(&self, id: InterfaceId, interface: *mut c_void) {
        self.inner.registry.borrow_mut().register(id, interface);
    }

    /// Look up an interface. First registration under `id` wins.
    pub fn get_interface(&self, id: InterfaceId) -> Option<*mut c_void> {
        self.inner.registry.borrow().lookup(id)
    }

    /// Register a device-event callback.
    pub fn register_device_event_callback(&self, callback: DeviceEventCallback) {
        self.inner.callbacks.borrow_mut().add(callback);
    }

    /// Remove the first matching registration of `callback`.
    pub fn unregister_device_event_callback(&self, callback: DeviceEventCallback) {
        self.inner.callbacks.borrow_mut().remove(callback);
    }

    /// Register the bootstrap interception hook. Single slot: the last
    /// registration before the bootstrap runs wins.
    pub fn intercept_vulkan_initialization(
        &self,
        callback: VulkanInitCallback,
        userdata: *mut c_void,
    ) {
        self.inner
            .intercept
            .set(Some(InterceptHook { callback, userdata }));
    }

    /// The active renderer kind: [`RendererKind::None`] until a bootstrap
    /// reaches Ready.
    pub fn renderer(&self) -> RendererKind {
        match *self.inner.renderer.borrow() {
            RendererState::Inactive => RendererKind::None,
            RendererState::Vulkan(_) => RendererKind::Vulkan,
        }
    }

    /// The published Vulkan context, if the bootstrap has succeeded.
    pub fn vulkan_context(&self) -> Option<VulkanContext> {
        match &*self.inner.renderer.borrow() {
            RendererState::Inactive => None,
            RendererState::Vulkan(renderer) => Some(renderer.context),
        }
    }

    /// Invoke every currently registered device-event callback, in order,
    /// synchronously on this thread. Iterates a snapshot, so mutations made
    /// by a callback apply from the next notification on.
    pub(crate) fn notify_device_event(&self, event: DeviceEvent) {
        let snapshot = self.inner.callbacks.borrow().snapshot();
        for callback in snapshot {
            // SAFETY: registrants keep callbacks callable while registered.
            unsafe { callback(event) };
        }
    }
}

// ─── ABI trampolines ─────────────────────────────────────────────────
//
// Every table function receives the HostInner back-pointer as its first
// argument. Borrows are taken transiently so a plugin calling back into the
// host from inside a load hook (or another table function) does not trip a
// RefCell conflict.

unsafe extern "C" fn host_get_interface(host: *mut c_void, id: InterfaceId) -> *mut c_void {
    // SAFETY: `host` was bound at construction and outlives every plugin
    // call; shared access only.
    let inner = unsafe { &*host.cast::<HostInner>() };
    inner
        .registry
        .borrow()
        .lookup(id)
        .unwrap_or(ptr::null_mut())
}

unsafe extern "C" fn host_register_interface(
    host: *mut c_void,
    id: InterfaceId,
    interface: *mut c_void,
) {
    // SAFETY: as for host_get_interface.
    let inner = unsafe { &*host.cast::<HostInner>() };
    inner.registry.borrow_mut().register(id, interface);
}

unsafe extern "C" fn host_get_renderer(host: *mut c_void) -> RendererKind {
    // SAFETY: as for host_get_interface.
    let inner = unsafe { &*host.cast::<HostInner>() };
    match *inner.renderer.borrow() {
        RendererState::Inactive => RendererKind::None,
        RendererState::Vulkan(_) => RendererKind::Vulkan,
    }
}

unsafe extern "C" fn host_register_device_event_callback(
    host: *mut c_void,
    callback: DeviceEventCallback,
) {
    // SAFETY: as for host_get_interface.
    let inner = unsafe { &*host.cast::<HostInner>() };
    inner.callbacks.borrow_mut().add(callback);
}

unsafe extern "C" fn host_unregister_device_event_callback(
    host: *mut c_void,
    callback: DeviceEventCallback,
) {
    // SAFETY: as for host_get_interface.
    let inner = unsafe { &*host.cast::<HostInner>() };
    inner.callbacks.borrow_mut().remove(callback);
}

unsafe extern "C" fn host_intercept_initialization(
    host: *mut c_void,
    callback: VulkanInitCallback,
    userdata: *mut c_void,
) -> bool {
    // SAFETY: as for host_get_interface.
    let inner = unsafe { &*host.cast::<HostInner>() };
    inner
        .intercept
        .set(Some(InterceptHook { callback, userdata }));
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MockLoader;

    fn test_host() -> Host {
        Host::with_loader(HostConfig::default(), Box::new(MockLoader::new())).unwrap()
    }

    #[test]
    fn test_builtin_interfaces_are_registered() {
        let host = test_host();
        assert!(host.get_interface(ids::GRAPHICS).is_some());
        assert!(host.get_interface(ids::GRAPHICS_VULKAN).is_some());
    }

    #[test]
    fn test_unknown_interface_lookup_misses() {
        let host = test_host();
        assert_eq!(host.get_interface(InterfaceId::new(0xdead, 0xbeef)), None);
    }

    #[test]
    fn test_non_vulkan_renderer_is_rejected() {
        let config = HostConfig {
            renderer: RendererKind::None,
            ..HostConfig::default()
        };
        let result = Host::with_loader(config, Box::new(MockLoader::new()));
        assert!(matches!(
            result,
            Err(PluginHostError::UnsupportedRenderer { .. })
        ));
    }

    #[test]
    fn test_renderer_is_none_before_bootstrap() {
        let host = test_host();
        assert_eq!(host.renderer(), RendererKind::None);
        assert!(host.vulkan_context().is_none());
    }

    #[test]
    fn test_lookup_through_the_abi_table() {
        let host = test_host();
        let interfaces = unsafe { &*host.interfaces() };

        let graphics = unsafe { interfaces.lookup(ids::GRAPHICS) };
        assert!(!graphics.is_null());

        let missing = unsafe { interfaces.lookup(InterfaceId::new(1, 1)) };
        assert!(missing.is_null());
    }

    #[test]
    fn test_plugin_registration_through_the_abi_table() {
        let host = test_host();
        let interfaces = unsafe { &*host.interfaces() };

        let id = InterfaceId::new(0x4242, 0x17);
        let fake_interface = 0x5150 as *mut c_void;
        unsafe { interfaces.publish(id, fake_interface) };

        assert_eq!(host.get_interface(id), Some(fake_interface));
    }

    #[test]
    fn test_renderer_query_through_the_graphics_table() {
        let host = test_host();
        let graphics = host
            .get_interface(ids::GRAPHICS)
            .unwrap()
            .cast::<GraphicsInterface>();
        let kind = unsafe { (*graphics).renderer() };
        assert_eq!(kind, RendererKind::None);
    }

    #[test]
    fn test_intercept_registration_through_the_vulkan_table() {
        unsafe extern "system" fn hook(
            _gipa: husk_plugin_api::vk::PfnGetInstanceProcAddr,
            _userdata: *mut c_void,
        ) -> Option<husk_plugin_api::vk::PfnGetInstanceProcAddr> {
            None
        }

        let host = test_host();
        let vulkan = host
            .get_interface(ids::GRAPHICS_VULKAN)
            .unwrap()
            .cast::<VulkanInterface>();
        let accepted = unsafe { (*vulkan).intercept(hook, ptr::null_mut()) };
        assert!(accepted);
        assert!(host.inner.intercept.get().is_some());
    }

    #[test]
    fn test_hosts_are_independent() {
        let a = test_host();
        let b = test_host();

        let id = InterfaceId::new(9, 9);
        a.register_interface(id, 0x1 as *mut c_void);
        assert!(b.get_interface(id).is_none());
    }
}
