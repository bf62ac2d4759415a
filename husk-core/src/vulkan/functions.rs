//! Staged resolution of the Vulkan entry points the bootstrap calls
//!
//! Entry points come in three tiers, each resolved with the handle minted by
//! the previous one: global functions with a null instance, instance
//! functions with the created `VkInstance`, device functions through
//! `vkGetDeviceProcAddr` with the created `VkDevice`. Every resolution is
//! mandatory; a missing name fails the bootstrap with the name in the error.

use std::ffi::CStr;
use std::mem;
use std::ptr;

use husk_plugin_api::vk;

use crate::error::BootstrapError;

fn missing(name: &CStr) -> BootstrapError {
    BootstrapError::MissingEntryPoint {
        name: name.to_string_lossy().into_owned(),
    }
}

/// Resolve `name` through the instance-level resolver, failing on `None`.
fn resolve(
    gipa: vk::PfnGetInstanceProcAddr,
    instance: vk::VkInstance,
    name: &CStr,
) -> Result<vk::PfnVoidFunction, BootstrapError> {
    // SAFETY: the resolver contract takes a (possibly null) instance and a
    // NUL-terminated name.
    unsafe { gipa(instance, name.as_ptr()) }.ok_or_else(|| missing(name))
}

fn resolve_device(
    gdpa: vk::PfnGetDeviceProcAddr,
    device: vk::VkDevice,
    name: &CStr,
) -> Result<vk::PfnVoidFunction, BootstrapError> {
    // SAFETY: as for `resolve`, with a live device handle.
    unsafe { gdpa(device, name.as_ptr()) }.ok_or_else(|| missing(name))
}

/// Entry points resolvable before any instance exists.
#[derive(Debug)]
pub(crate) struct GlobalFunctions {
    pub enumerate_instance_version: vk::PfnEnumerateInstanceVersion,
    pub create_instance: vk::PfnCreateInstance,
}

impl GlobalFunctions {
    pub(crate) fn resolve(gipa: vk::PfnGetInstanceProcAddr) -> Result<Self, BootstrapError> {
        // SAFETY: transmutes pair each resolved name with the signature the
        // Vulkan headers declare for it.
        unsafe {
            Ok(Self {
                enumerate_instance_version: mem::transmute::<
                    vk::PfnVoidFunction,
                    vk::PfnEnumerateInstanceVersion,
                >(resolve(
                    gipa,
                    ptr::null_mut(),
                    c"vkEnumerateInstanceVersion",
                )?),
                create_instance: mem::transmute::<vk::PfnVoidFunction, vk::PfnCreateInstance>(
                    resolve(gipa, ptr::null_mut(), c"vkCreateInstance")?,
                ),
            })
        }
    }
}

/// Entry points resolved against a created instance. `vkDestroyInstance` is
/// resolved separately ([`InstanceFunctions::resolve_destroy`]) and kept by
/// the caller's rollback guard rather than carried here.
pub(crate) struct InstanceFunctions {
    pub enumerate_physical_devices: vk::PfnEnumeratePhysicalDevices,
    pub get_physical_device_properties: vk::PfnGetPhysicalDeviceProperties,
    pub create_device: vk::PfnCreateDevice,
    pub get_device_proc_addr: vk::PfnGetDeviceProcAddr,
}

impl InstanceFunctions {
    /// Resolve `vkDestroyInstance` alone. The bootstrap needs it before
    /// anything else instance-level so a later failure can roll the instance
    /// back.
    pub(crate) fn resolve_destroy(
        gipa: vk::PfnGetInstanceProcAddr,
        instance: vk::VkInstance,
    ) -> Result<vk::PfnDestroyInstance, BootstrapError> {
        // SAFETY: as in `GlobalFunctions::resolve`.
        unsafe {
            Ok(mem::transmute::<vk::PfnVoidFunction, vk::PfnDestroyInstance>(resolve(
                gipa,
                instance,
                c"vkDestroyInstance",
            )?))
        }
    }

    pub(crate) fn resolve(
        gipa: vk::PfnGetInstanceProcAddr,
        instance: vk::VkInstance,
    ) -> Result<Self, BootstrapError> {
        // SAFETY: as in `GlobalFunctions::resolve`.
        unsafe {
            Ok(Self {
                enumerate_physical_devices: mem::transmute::<
                    vk::PfnVoidFunction,
                    vk::PfnEnumeratePhysicalDevices,
                >(resolve(
                    gipa,
                    instance,
                    c"vkEnumeratePhysicalDevices",
                )?),
                get_physical_device_properties: mem::transmute::<
                    vk::PfnVoidFunction,
                    vk::PfnGetPhysicalDeviceProperties,
                >(resolve(
                    gipa,
                    instance,
                    c"vkGetPhysicalDeviceProperties",
                )?),
                create_device: mem::transmute::<vk::PfnVoidFunction, vk::PfnCreateDevice>(
                    resolve(gipa, instance, c"vkCreateDevice")?,
                ),
                get_device_proc_addr: mem::transmute::<
                    vk::PfnVoidFunction,
                    vk::PfnGetDeviceProcAddr,
                >(resolve(gipa, instance, c"vkGetDeviceProcAddr")?),
            })
        }
    }
}

/// Entry points resolved against a created device.
pub(crate) struct DeviceFunctions {
    pub destroy_device: vk::PfnDestroyDevice,
    pub get_device_queue: vk::PfnGetDeviceQueue,
}

impl DeviceFunctions {
    /// Resolve `vkDestroyDevice` alone, for the same reason
    /// [`InstanceFunctions::resolve_destroy`] exists at the instance level.
    pub(crate) fn resolve_destroy(
        gdpa: vk::PfnGetDeviceProcAddr,
        device: vk::VkDevice,
    ) -> Result<vk::PfnDestroyDevice, BootstrapError> {
        // SAFETY: as in `GlobalFunctions::resolve`.
        unsafe {
            Ok(mem::transmute::<vk::PfnVoidFunction, vk::PfnDestroyDevice>(resolve_device(
                gdpa,
                device,
                c"vkDestroyDevice",
            )?))
        }
    }

    pub(crate) fn resolve(
        gdpa: vk::PfnGetDeviceProcAddr,
        device: vk::VkDevice,
        destroy_device: vk::PfnDestroyDevice,
    ) -> Result<Self, BootstrapError> {
        // SAFETY: as in `GlobalFunctions::resolve`.
        unsafe {
            Ok(Self {
                destroy_device,
                get_device_queue: mem::transmute::<vk::PfnVoidFunction, vk::PfnGetDeviceQueue>(
                    resolve_device(gdpa, device, c"vkGetDeviceQueue")?,
                ),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vulkan::mock::MockVulkan;

    #[test]
    fn test_global_resolution_succeeds_against_the_mock() {
        let mock = MockVulkan::fresh();
        let functions = GlobalFunctions::resolve(mock.resolver()).unwrap();
        // Presence is what matters; exercising the pointers is bootstrap's
        // job.
        let _ = functions.create_instance;
        let _ = functions.enumerate_instance_version;
    }

    #[test]
    fn test_hidden_entry_point_is_named_in_the_error() {
        let mock = MockVulkan::fresh();
        mock.hide_symbol("vkCreateInstance");
        let err = GlobalFunctions::resolve(mock.resolver()).unwrap_err();
        match err {
            BootstrapError::MissingEntryPoint { name } => {
                assert_eq!(name, "vkCreateInstance");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
