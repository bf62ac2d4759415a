//! Minimal Vulkan FFI surface
//!
//! The host never links Vulkan; every entry point is reached through a
//! resolver function pointer obtained at runtime, so all we need are the
//! handle types, the function-pointer signatures of the calls the bootstrap
//! sequences, and the create-info structs those calls take. A binding crate
//! would hide exactly the staged resolution this crate exists to exercise.
//!
//! Only the calls in the bootstrap protocol are declared. Layouts follow the
//! Vulkan 1.1 C headers.

#![allow(non_camel_case_types)]

use core::ffi::{c_char, c_void};

// ─── Handles ─────────────────────────────────────────────────────────

#[repr(C)]
pub struct VkInstance_T {
    _unconstructable: [u8; 0],
}
pub type VkInstance = *mut VkInstance_T;

#[repr(C)]
pub struct VkPhysicalDevice_T {
    _unconstructable: [u8; 0],
}
pub type VkPhysicalDevice = *mut VkPhysicalDevice_T;

#[repr(C)]
pub struct VkDevice_T {
    _unconstructable: [u8; 0],
}
pub type VkDevice = *mut VkDevice_T;

#[repr(C)]
pub struct VkQueue_T {
    _unconstructable: [u8; 0],
}
pub type VkQueue = *mut VkQueue_T;

// ─── Result and structure-type codes ─────────────────────────────────

pub type VkResult = i32;
pub const VK_SUCCESS: VkResult = 0;
pub const VK_ERROR_INITIALIZATION_FAILED: VkResult = -3;

pub type VkStructureType = i32;
pub const VK_STRUCTURE_TYPE_APPLICATION_INFO: VkStructureType = 0;
pub const VK_STRUCTURE_TYPE_INSTANCE_CREATE_INFO: VkStructureType = 1;
pub const VK_STRUCTURE_TYPE_DEVICE_QUEUE_CREATE_INFO: VkStructureType = 2;
pub const VK_STRUCTURE_TYPE_DEVICE_CREATE_INFO: VkStructureType = 3;

// ─── Version packing ─────────────────────────────────────────────────

pub const fn make_version(major: u32, minor: u32, patch: u32) -> u32 {
    (major << 22) | (minor << 12) | patch
}

pub const fn version_major(version: u32) -> u32 {
    version >> 22
}

pub const fn version_minor(version: u32) -> u32 {
    (version >> 12) & 0x3ff
}

pub const fn version_patch(version: u32) -> u32 {
    version & 0xfff
}

pub const VK_API_VERSION_1_0: u32 = make_version(1, 0, 0);
pub const VK_API_VERSION_1_1: u32 = make_version(1, 1, 0);

// ─── Function pointers ───────────────────────────────────────────────

/// Untyped entry point as returned by the resolvers; transmuted to the
/// concrete signature by the caller.
pub type PfnVoidFunction = unsafe extern "system" fn();

pub type PfnGetInstanceProcAddr =
    unsafe extern "system" fn(instance: VkInstance, name: *const c_char) -> Option<PfnVoidFunction>;

pub type PfnGetDeviceProcAddr =
    unsafe extern "system" fn(device: VkDevice, name: *const c_char) -> Option<PfnVoidFunction>;

pub type PfnEnumerateInstanceVersion =
    unsafe extern "system" fn(version: *mut u32) -> VkResult;

pub type PfnCreateInstance = unsafe extern "system" fn(
    create_info: *const VkInstanceCreateInfo,
    allocator: *const c_void,
    instance: *mut VkInstance,
) -> VkResult;

pub type PfnDestroyInstance =
    unsafe extern "system" fn(instance: VkInstance, allocator: *const c_void);

pub type PfnEnumeratePhysicalDevices = unsafe extern "system" fn(
    instance: VkInstance,
    count: *mut u32,
    devices: *mut VkPhysicalDevice,
) -> VkResult;

pub type PfnGetPhysicalDeviceProperties = unsafe extern "system" fn(
    physical_device: VkPhysicalDevice,
    properties: *mut VkPhysicalDeviceProperties,
);

pub type PfnCreateDevice = unsafe extern "system" fn(
    physical_device: VkPhysicalDevice,
    create_info: *const VkDeviceCreateInfo,
    allocator: *const c_void,
    device: *mut VkDevice,
) -> VkResult;

pub type PfnDestroyDevice =
    unsafe extern "system" fn(device: VkDevice, allocator: *const c_void);

pub type PfnGetDeviceQueue = unsafe extern "system" fn(
    device: VkDevice,
    queue_family_index: u32,
    queue_index: u32,
    queue: *mut VkQueue,
);

// ─── Create-info structs ─────────────────────────────────────────────

#[repr(C)]
pub struct VkApplicationInfo {
    pub s_type: VkStructureType,
    pub p_next: *const c_void,
    pub p_application_name: *const c_char,
    pub application_version: u32,
    pub p_engine_name: *const c_char,
    pub engine_version: u32,
    pub api_version: u32,
}

#[repr(C)]
pub struct VkInstanceCreateInfo {
    pub s_type: VkStructureType,
    pub p_next: *const c_void,
    pub flags: u32,
    pub p_application_info: *const VkApplicationInfo,
    pub enabled_layer_count: u32,
    pub pp_enabled_layer_names: *const *const c_char,
    pub enabled_extension_count: u32,
    pub pp_enabled_extension_names: *const *const c_char,
}

#[repr(C)]
pub struct VkDeviceQueueCreateInfo {
    pub s_type: VkStructureType,
    pub p_next: *const c_void,
    pub flags: u32,
    pub queue_family_index: u32,
    pub queue_count: u32,
    pub p_queue_priorities: *const f32,
}

#[repr(C)]
pub struct VkDeviceCreateInfo {
    pub s_type: VkStructureType,
    pub p_next: *const c_void,
    pub flags: u32,
    pub queue_create_info_count: u32,
    pub p_queue_create_infos: *const VkDeviceQueueCreateInfo,
    pub enabled_layer_count: u32,
    pub pp_enabled_layer_names: *const *const c_char,
    pub enabled_extension_count: u32,
    pub pp_enabled_extension_names: *const *const c_char,
    pub p_enabled_features: *const c_void,
}

/// Physical-device properties, truncated.
///
/// The host only reads `api_version`, `device_type` and `device_name` for
/// diagnostics; `limits` and `sparse_properties` are carried as opaque blocks
/// of the exact size the driver writes.
#[repr(C)]
pub struct VkPhysicalDeviceProperties {
    pub api_version: u32,
    pub driver_version: u32,
    pub vendor_id: u32,
    pub device_id: u32,
    pub device_type: i32,
    pub device_name: [c_char; 256],
    pub pipeline_cache_uuid: [u8; 16],
    /// Opaque stand-in for `VkPhysicalDeviceLimits` (504 bytes, align 8).
    pub limits: [u64; 63],
    /// Opaque stand-in for `VkPhysicalDeviceSparseProperties` (5 x VkBool32).
    pub sparse_properties: [u32; 5],
}

#[cfg(target_pointer_width = "64")]
const _: () = assert!(core::mem::size_of::<VkPhysicalDeviceProperties>() == 824);

impl VkPhysicalDeviceProperties {
    /// An all-zero value suitable as an out-parameter.
    pub fn zeroed() -> Self {
        // Plain data, no invalid bit patterns.
        unsafe { core::mem::zeroed() }
    }

    /// The device name as UTF-8, up to the first NUL.
    pub fn name(&self) -> String {
        let bytes: Vec<u8> = self
            .device_name
            .iter()
            .take_while(|&&c| c != 0)
            .map(|&c| c as u8)
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}
