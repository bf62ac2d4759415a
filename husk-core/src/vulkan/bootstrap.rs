//! The staged Vulkan bootstrap
//!
//! Bringing a context up is a strict sequence: open the loader library, pull
//! `vkGetInstanceProcAddr` out of it, offer the resolver to the interception
//! hook, resolve globals, create the instance, pick a physical device, create
//! the device, fetch the queue, publish. Each stage depends on a handle or
//! function pointer produced by the one before it.
//!
//! Failure anywhere rolls back completely: scope guards destroy the instance
//! and device created so far, and dropping the library handle closes it. On
//! the error path the host is exactly as it was before the attempt, except
//! that a registered interception hook has been consumed.

use std::ffi::CString;
use std::mem;
use std::ptr;

use husk_plugin_api::{DeviceEvent, vk};

use crate::error::BootstrapError;
use crate::host::Host;
use crate::loader::RawSymbol;
use crate::vulkan::functions::{DeviceFunctions, GlobalFunctions, InstanceFunctions};
use crate::vulkan::{RendererState, VulkanContext, VulkanRenderer};

/// The queue family the bootstrap requests its single queue from. Hard-coded
/// with no capability matching; family 0 supports graphics on every driver
/// this host targets.
const QUEUE_FAMILY_INDEX: u32 = 0;

/// Knobs for a bootstrap attempt.
#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    /// Application name reported in `VkApplicationInfo`.
    pub application_name: String,
    /// Physical device to use, by enumeration index. Negative or
    /// out-of-range values fall back to device 0.
    pub device_index: i32,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            application_name: "husk".to_string(),
            device_index: -1,
        }
    }
}

/// Destroys the instance on drop unless disarmed.
struct OwnedInstance {
    instance: vk::VkInstance,
    destroy: vk::PfnDestroyInstance,
    armed: bool,
}

impl OwnedInstance {
    fn new(instance: vk::VkInstance, destroy: vk::PfnDestroyInstance) -> Self {
        Self {
            instance,
            destroy,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for OwnedInstance {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!("rolling back vulkan instance");
            // SAFETY: the instance was created in this attempt and nothing
            // else destroys it.
            unsafe { (self.destroy)(self.instance, ptr::null()) };
        }
    }
}

/// Destroys the device on drop unless disarmed. Declared after the device is
/// created and dropped (on failure) before [`OwnedInstance`], preserving the
/// device-before-instance teardown order.
struct OwnedDevice {
    device: vk::VkDevice,
    destroy: vk::PfnDestroyDevice,
    armed: bool,
}

impl OwnedDevice {
    fn new(device: vk::VkDevice, destroy: vk::PfnDestroyDevice) -> Self {
        Self {
            device,
            destroy,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for OwnedDevice {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!("rolling back vulkan device");
            // SAFETY: the device was created in this attempt and nothing
            // else destroys it.
            unsafe { (self.destroy)(self.device, ptr::null()) };
        }
    }
}

impl Host {
    /// Run the Vulkan bootstrap and publish the resulting context.
    ///
    /// Refuses if a context is already active. On any failure the attempt is
    /// fully rolled back and the host stays in the inactive state, so a later
    /// attempt can be made.
    ///
    /// On success the renderer flips to Vulkan and every registered
    /// device-event callback receives [`DeviceEvent::Initialize`] before this
    /// returns.
    pub fn bootstrap_vulkan(
        &self,
        options: &BootstrapOptions,
    ) -> Result<VulkanContext, BootstrapError> {
        if !matches!(*self.inner.renderer.borrow(), RendererState::Inactive) {
            return Err(BootstrapError::AlreadyActive);
        }

        let path = self.inner.config.vulkan_loader_path();
        tracing::info!(path = %path.display(), "starting vulkan bootstrap");
        let library = self.inner.loader.open(&path)?;

        let raw = library
            .symbol("vkGetInstanceProcAddr")
            .ok_or_else(|| BootstrapError::MissingEntryPoint {
                name: "vkGetInstanceProcAddr".to_string(),
            })?;
        // SAFETY: the loader library exports this symbol with the resolver
        // signature.
        let mut gipa = unsafe { mem::transmute::<RawSymbol, vk::PfnGetInstanceProcAddr>(raw) };

        // The interception hook is consumed here: it runs exactly once, and
        // whatever resolver it returns is used for every later stage.
        if let Some(hook) = self.inner.intercept.take() {
            // SAFETY: the registrant promised the callback stays callable
            // until the bootstrap runs.
            if let Some(replacement) = unsafe { (hook.callback)(gipa, hook.userdata) } {
                tracing::debug!("interception hook substituted the resolver");
                gipa = replacement;
            }
        }

        let globals = GlobalFunctions::resolve(gipa)?;

        // The result is diagnostic only; a driver that fails the query can
        // still create a usable instance.
        let mut loader_version = 0u32;
        // SAFETY: valid out-pointer.
        let code = unsafe { (globals.enumerate_instance_version)(&mut loader_version) };
        if code == vk::VK_SUCCESS {
            tracing::debug!(
                major = vk::version_major(loader_version),
                minor = vk::version_minor(loader_version),
                "instance-level vulkan version"
            );
        } else {
            tracing::warn!(code, "vkEnumerateInstanceVersion failed");
        }

        let application_name =
            CString::new(options.application_name.as_str()).unwrap_or_default();
        let application_info = vk::VkApplicationInfo {
            s_type: vk::VK_STRUCTURE_TYPE_APPLICATION_INFO,
            p_next: ptr::null(),
            p_application_name: application_name.as_ptr(),
            application_version: vk::make_version(0, 1, 0),
            p_engine_name: c"husk".as_ptr(),
            engine_version: vk::make_version(0, 1, 0),
            api_version: vk::VK_API_VERSION_1_1,
        };
        let instance_info = vk::VkInstanceCreateInfo {
            s_type: vk::VK_STRUCTURE_TYPE_INSTANCE_CREATE_INFO,
            p_next: ptr::null(),
            flags: 0,
            p_application_info: &application_info,
            enabled_layer_count: 0,
            pp_enabled_layer_names: ptr::null(),
            enabled_extension_count: 0,
            pp_enabled_extension_names: ptr::null(),
        };
        let mut instance: vk::VkInstance = ptr::null_mut();
        // SAFETY: both pointers outlive the call; out-pointer is valid.
        let code = unsafe { (globals.create_instance)(&instance_info, ptr::null(), &mut instance) };
        if code != vk::VK_SUCCESS {
            return Err(BootstrapError::InstanceCreation { code });
        }

        // Resolve the destroyer before anything else can fail, so the guard
        // can roll the instance back. If vkDestroyInstance itself is
        // unresolvable there is nothing to roll back with.
        let destroy_instance = InstanceFunctions::resolve_destroy(gipa, instance)?;
        let instance_guard = OwnedInstance::new(instance, destroy_instance);
        let instance_fns = InstanceFunctions::resolve(gipa, instance)?;

        // Two-call enumeration.
        let mut count = 0u32;
        // SAFETY: valid out-pointer, null array per the protocol.
        let code = unsafe {
            (instance_fns.enumerate_physical_devices)(instance, &mut count, ptr::null_mut())
        };
        if code != vk::VK_SUCCESS {
            return Err(BootstrapError::Enumeration { code });
        }
        if count == 0 {
            return Err(BootstrapError::NoPhysicalDevices);
        }
        let mut devices: Vec<vk::VkPhysicalDevice> = vec![ptr::null_mut(); count as usize];
        // SAFETY: the array holds `count` elements.
        let code = unsafe {
            (instance_fns.enumerate_physical_devices)(instance, &mut count, devices.as_mut_ptr())
        };
        if code != vk::VK_SUCCESS {
            return Err(BootstrapError::Enumeration { code });
        }
        devices.truncate(count as usize);
        if devices.is_empty() {
            return Err(BootstrapError::NoPhysicalDevices);
        }

        for (index, &candidate) in devices.iter().enumerate() {
            let mut properties = vk::VkPhysicalDeviceProperties::zeroed();
            // SAFETY: live physical device, valid out-pointer.
            unsafe { (instance_fns.get_physical_device_properties)(candidate, &mut properties) };
            tracing::debug!(
                index,
                device = %properties.name(),
                device_type = properties.device_type,
                api_major = vk::version_major(properties.api_version),
                api_minor = vk::version_minor(properties.api_version),
                "enumerated physical device"
            );
        }

        let selected = match usize::try_from(options.device_index) {
            Ok(index) if index < devices.len() => index,
            // Negative or out-of-range selections fall back to device 0.
            _ => 0,
        };
        let physical_device = devices[selected];

        let mut properties = vk::VkPhysicalDeviceProperties::zeroed();
        // SAFETY: live physical device, valid out-pointer.
        unsafe { (instance_fns.get_physical_device_properties)(physical_device, &mut properties) };
        tracing::info!(
            device = %properties.name(),
            index = selected,
            api_major = vk::version_major(properties.api_version),
            api_minor = vk::version_minor(properties.api_version),
            "selected physical device"
        );

        let queue_priority = 1.0f32;
        let queue_info = vk::VkDeviceQueueCreateInfo {
            s_type: vk::VK_STRUCTURE_TYPE_DEVICE_QUEUE_CREATE_INFO,
            p_next: ptr::null(),
            flags: 0,
            queue_family_index: QUEUE_FAMILY_INDEX,
            queue_count: 1,
            p_queue_priorities: &queue_priority,
        };
        let device_info = vk::VkDeviceCreateInfo {
            s_type: vk::VK_STRUCTURE_TYPE_DEVICE_CREATE_INFO,
            p_next: ptr::null(),
            flags: 0,
            queue_create_info_count: 1,
            p_queue_create_infos: &queue_info,
            enabled_layer_count: 0,
            pp_enabled_layer_names: ptr::null(),
            enabled_extension_count: 0,
            pp_enabled_extension_names: ptr::null(),
            p_enabled_features: ptr::null(),
        };
        let mut device: vk::VkDevice = ptr::null_mut();
        // SAFETY: all pointers outlive the call; out-pointer is valid.
        let code = unsafe {
            (instance_fns.create_device)(physical_device, &device_info, ptr::null(), &mut device)
        };
        if code != vk::VK_SUCCESS {
            return Err(BootstrapError::DeviceCreation { code });
        }

        let destroy_device =
            DeviceFunctions::resolve_destroy(instance_fns.get_device_proc_addr, device)?;
        let device_guard = OwnedDevice::new(device, destroy_device);
        let device_fns =
            DeviceFunctions::resolve(instance_fns.get_device_proc_addr, device, destroy_device)?;

        let mut queue: vk::VkQueue = ptr::null_mut();
        // SAFETY: the device was created with one queue in this family.
        unsafe { (device_fns.get_device_queue)(device, QUEUE_FAMILY_INDEX, 0, &mut queue) };

        let context = VulkanContext {
            instance,
            physical_device,
            device,
            queue,
            queue_family_index: QUEUE_FAMILY_INDEX,
            get_instance_proc_addr: gipa,
            get_device_proc_addr: instance_fns.get_device_proc_addr,
        };

        device_guard.disarm();
        instance_guard.disarm();
        *self.inner.renderer.borrow_mut() = RendererState::Vulkan(VulkanRenderer {
            context,
            destroy_device: device_fns.destroy_device,
            destroy_instance,
            _library: library,
        });
        tracing::info!("vulkan context ready");

        // Borrows are released; callbacks may re-enter the host.
        self.notify_device_event(DeviceEvent::Initialize);

        Ok(context)
    }
}
