//! Vulkan renderer state and bootstrap
//!
//! The host reaches Vulkan purely through runtime resolution: it opens the
//! loader library, pulls `vkGetInstanceProcAddr` out of it and resolves every
//! other entry point through that (or through whatever resolver an
//! interception hook substitutes). [`bootstrap`] runs the staged sequence;
//! [`mock`] is an in-process driver for exercising it in tests.

pub(crate) mod bootstrap;
mod functions;
pub mod mock;

use husk_plugin_api::vk;

use crate::loader::SharedLibrary;

pub use bootstrap::BootstrapOptions;

/// The published Vulkan context.
///
/// Raw handles only; the host retains ownership and destroys them at
/// shutdown. Plugins and embedders must not destroy these themselves.
#[derive(Debug, Clone, Copy)]
pub struct VulkanContext {
    pub instance: vk::VkInstance,
    pub physical_device: vk::VkPhysicalDevice,
    pub device: vk::VkDevice,
    pub queue: vk::VkQueue,
    pub queue_family_index: u32,
    /// The instance-level resolver the bootstrap ended up using (the
    /// interception hook's substitute, if there was one).
    pub get_instance_proc_addr: vk::PfnGetInstanceProcAddr,
    /// The device-level resolver, bound to `device`.
    pub get_device_proc_addr: vk::PfnGetDeviceProcAddr,
}

/// What the host's renderer slot currently holds.
pub(crate) enum RendererState {
    Inactive,
    Vulkan(VulkanRenderer),
}

/// An active Vulkan context together with everything needed to tear it down.
///
/// Field order matters: the loader library must outlive the destroy calls
/// made in `Drop`, so it is declared last.
pub(crate) struct VulkanRenderer {
    pub(crate) context: VulkanContext,
    destroy_device: vk::PfnDestroyDevice,
    destroy_instance: vk::PfnDestroyInstance,
    _library: Box<dyn SharedLibrary>,
}

impl Drop for VulkanRenderer {
    fn drop(&mut self) {
        tracing::debug!("destroying vulkan context");
        // SAFETY: the handles were created by this renderer and are destroyed
        // exactly once, device before instance.
        unsafe {
            (self.destroy_device)(self.context.device, std::ptr::null());
            (self.destroy_instance)(self.context.instance, std::ptr::null());
        }
    }
}
