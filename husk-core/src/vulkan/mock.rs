//! In-process Vulkan driver for tests
//!
//! [`MockVulkan`] stands in for the loader library plus ICD: it hands out an
//! instance-proc-addr resolver whose entry points operate on thread-local
//! state. Tests use the knobs to hide entry points or make calls fail at any
//! stage, and the counters to assert that every created handle was destroyed
//! again after a rollback.
//!
//! State is thread-local, so parallel tests do not interfere as long as each
//! keeps its host on its own thread (which `cargo test` does).

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::ffi::{CStr, c_char, c_void};
use std::mem;

use husk_plugin_api::vk;

use crate::loader::{MockLoader, RawSymbol};

const INSTANCE_HANDLE: usize = 0x10;
const PHYSICAL_DEVICE_BASE: usize = 0x100;
const DEVICE_HANDLE: usize = 0x200;
const QUEUE_HANDLE: usize = 0x300;

#[derive(Default)]
struct MockState {
    hidden: HashSet<String>,
    failures: HashMap<String, vk::VkResult>,
    device_count: u32,
    instances_created: usize,
    instances_destroyed: usize,
    devices_created: usize,
    devices_destroyed: usize,
    version_queries: usize,
    last_device_parent: Option<usize>,
    last_queue_family: Option<u32>,
}

thread_local! {
    static STATE: RefCell<MockState> = RefCell::new(MockState::default());
}

fn with_state<R>(f: impl FnOnce(&mut MockState) -> R) -> R {
    STATE.with(|state| f(&mut state.borrow_mut()))
}

fn failure_for(name: &str) -> Option<vk::VkResult> {
    with_state(|state| state.failures.get(name).copied())
}

/// Handle to this thread's mock driver state.
pub struct MockVulkan {
    _not_send: std::marker::PhantomData<*mut ()>,
}

impl MockVulkan {
    /// Reset the thread's driver state and return a handle to it. One
    /// physical device by default.
    pub fn fresh() -> Self {
        with_state(|state| {
            *state = MockState {
                device_count: 1,
                ..MockState::default()
            };
        });
        Self {
            _not_send: std::marker::PhantomData,
        }
    }

    /// The mock's root resolver, as the bootstrap would obtain it from the
    /// loader library.
    pub fn resolver(&self) -> vk::PfnGetInstanceProcAddr {
        mock_get_instance_proc_addr
    }

    /// The root resolver as an untyped symbol, for registering with a
    /// [`MockLoader`].
    pub fn resolver_symbol(&self) -> RawSymbol {
        mock_get_instance_proc_addr as vk::PfnGetInstanceProcAddr as usize as RawSymbol
    }

    /// Register a fake loader library at `path` exporting
    /// `vkGetInstanceProcAddr`.
    pub fn install(&self, loader: &MockLoader, path: &str) {
        loader.add_library(path, &[("vkGetInstanceProcAddr", self.resolver_symbol())]);
    }

    /// Make the named entry point unresolvable.
    pub fn hide_symbol(&self, name: &str) {
        with_state(|state| {
            state.hidden.insert(name.to_string());
        });
    }

    /// Make the named entry point return `code` instead of doing its work.
    pub fn fail_call(&self, name: &str, code: vk::VkResult) {
        with_state(|state| {
            state.failures.insert(name.to_string(), code);
        });
    }

    /// Undo a [`MockVulkan::fail_call`] so a retried bootstrap can succeed.
    pub fn clear_failure(&self, name: &str) {
        with_state(|state| {
            state.failures.remove(name);
        });
    }

    /// How many physical devices enumeration reports.
    pub fn set_device_count(&self, count: u32) {
        with_state(|state| state.device_count = count);
    }

    pub fn instances_created(&self) -> usize {
        with_state(|state| state.instances_created)
    }

    pub fn instances_destroyed(&self) -> usize {
        with_state(|state| state.instances_destroyed)
    }

    pub fn devices_created(&self) -> usize {
        with_state(|state| state.devices_created)
    }

    pub fn devices_destroyed(&self) -> usize {
        with_state(|state| state.devices_destroyed)
    }

    /// How many times `vkEnumerateInstanceVersion` was called.
    pub fn version_queries(&self) -> usize {
        with_state(|state| state.version_queries)
    }

    /// Index of the physical device the last `vkCreateDevice` targeted.
    pub fn last_device_parent(&self) -> Option<usize> {
        with_state(|state| state.last_device_parent)
    }

    /// Queue family index of the last `vkCreateDevice` call.
    pub fn last_queue_family(&self) -> Option<u32> {
        with_state(|state| state.last_queue_family)
    }
}

// ─── Entry points ────────────────────────────────────────────────────

unsafe extern "system" fn mock_get_instance_proc_addr(
    _instance: vk::VkInstance,
    name: *const c_char,
) -> Option<vk::PfnVoidFunction> {
    // SAFETY: callers pass a NUL-terminated name per the resolver contract.
    let name = unsafe { CStr::from_ptr(name) }.to_str().ok()?;
    if with_state(|state| state.hidden.contains(name)) {
        return None;
    }
    // SAFETY: each transmute restores the signature the name was declared
    // with.
    unsafe {
        let pfn: vk::PfnVoidFunction = match name {
            "vkEnumerateInstanceVersion" => mem::transmute::<
                vk::PfnEnumerateInstanceVersion,
                vk::PfnVoidFunction,
            >(mock_enumerate_instance_version),
            "vkCreateInstance" => mem::transmute::<vk::PfnCreateInstance, vk::PfnVoidFunction>(
                mock_create_instance,
            ),
            "vkDestroyInstance" => mem::transmute::<vk::PfnDestroyInstance, vk::PfnVoidFunction>(
                mock_destroy_instance,
            ),
            "vkEnumeratePhysicalDevices" => mem::transmute::<
                vk::PfnEnumeratePhysicalDevices,
                vk::PfnVoidFunction,
            >(mock_enumerate_physical_devices),
            "vkGetPhysicalDeviceProperties" => mem::transmute::<
                vk::PfnGetPhysicalDeviceProperties,
                vk::PfnVoidFunction,
            >(mock_get_physical_device_properties),
            "vkCreateDevice" => {
                mem::transmute::<vk::PfnCreateDevice, vk::PfnVoidFunction>(mock_create_device)
            }
            "vkGetDeviceProcAddr" => mem::transmute::<
                vk::PfnGetDeviceProcAddr,
                vk::PfnVoidFunction,
            >(mock_get_device_proc_addr),
            _ => return None,
        };
        Some(pfn)
    }
}

unsafe extern "system" fn mock_get_device_proc_addr(
    _device: vk::VkDevice,
    name: *const c_char,
) -> Option<vk::PfnVoidFunction> {
    // SAFETY: as for mock_get_instance_proc_addr.
    let name = unsafe { CStr::from_ptr(name) }.to_str().ok()?;
    if with_state(|state| state.hidden.contains(name)) {
        return None;
    }
    // SAFETY: as for mock_get_instance_proc_addr.
    unsafe {
        let pfn: vk::PfnVoidFunction = match name {
            "vkDestroyDevice" => {
                mem::transmute::<vk::PfnDestroyDevice, vk::PfnVoidFunction>(mock_destroy_device)
            }
            "vkGetDeviceQueue" => {
                mem::transmute::<vk::PfnGetDeviceQueue, vk::PfnVoidFunction>(mock_get_device_queue)
            }
            _ => return None,
        };
        Some(pfn)
    }
}

unsafe extern "system" fn mock_enumerate_instance_version(version: *mut u32) -> vk::VkResult {
    with_state(|state| state.version_queries += 1);
    if let Some(code) = failure_for("vkEnumerateInstanceVersion") {
        return code;
    }
    // SAFETY: caller supplies a valid out-pointer.
    unsafe { *version = vk::VK_API_VERSION_1_1 };
    vk::VK_SUCCESS
}

unsafe extern "system" fn mock_create_instance(
    _create_info: *const vk::VkInstanceCreateInfo,
    _allocator: *const c_void,
    instance: *mut vk::VkInstance,
) -> vk::VkResult {
    if let Some(code) = failure_for("vkCreateInstance") {
        return code;
    }
    with_state(|state| state.instances_created += 1);
    // SAFETY: caller supplies a valid out-pointer.
    unsafe { *instance = INSTANCE_HANDLE as vk::VkInstance };
    vk::VK_SUCCESS
}

unsafe extern "system" fn mock_destroy_instance(
    _instance: vk::VkInstance,
    _allocator: *const c_void,
) {
    with_state(|state| state.instances_destroyed += 1);
}

unsafe extern "system" fn mock_enumerate_physical_devices(
    _instance: vk::VkInstance,
    count: *mut u32,
    devices: *mut vk::VkPhysicalDevice,
) -> vk::VkResult {
    if let Some(code) = failure_for("vkEnumeratePhysicalDevices") {
        return code;
    }
    let available = with_state(|state| state.device_count);
    if devices.is_null() {
        // SAFETY: count is a valid out-pointer in the two-call protocol.
        unsafe { *count = available };
        return vk::VK_SUCCESS;
    }
    // SAFETY: caller sized the array by the first call's count.
    unsafe {
        let requested = (*count).min(available);
        for i in 0..requested {
            *devices.add(i as usize) =
                (PHYSICAL_DEVICE_BASE + i as usize) as vk::VkPhysicalDevice;
        }
        *count = requested;
    }
    vk::VK_SUCCESS
}

unsafe extern "system" fn mock_get_physical_device_properties(
    physical_device: vk::VkPhysicalDevice,
    properties: *mut vk::VkPhysicalDeviceProperties,
) {
    let index = physical_device as usize - PHYSICAL_DEVICE_BASE;
    let mut props = vk::VkPhysicalDeviceProperties::zeroed();
    props.api_version = vk::VK_API_VERSION_1_1;
    props.device_id = index as u32;
    let name = format!("husk-mock-{index}");
    for (dst, src) in props.device_name.iter_mut().zip(name.bytes()) {
        *dst = src as c_char;
    }
    // SAFETY: caller supplies a valid out-pointer.
    unsafe { *properties = props };
}

unsafe extern "system" fn mock_create_device(
    physical_device: vk::VkPhysicalDevice,
    create_info: *const vk::VkDeviceCreateInfo,
    _allocator: *const c_void,
    device: *mut vk::VkDevice,
) -> vk::VkResult {
    if let Some(code) = failure_for("vkCreateDevice") {
        return code;
    }
    // SAFETY: create_info and its queue array come from the bootstrap.
    let queue_family = unsafe {
        let info = &*create_info;
        if info.queue_create_info_count > 0 {
            Some((*info.p_queue_create_infos).queue_family_index)
        } else {
            None
        }
    };
    with_state(|state| {
        state.devices_created += 1;
        state.last_device_parent = Some(physical_device as usize - PHYSICAL_DEVICE_BASE);
        state.last_queue_family = queue_family;
    });
    // SAFETY: caller supplies a valid out-pointer.
    unsafe { *device = DEVICE_HANDLE as vk::VkDevice };
    vk::VK_SUCCESS
}

unsafe extern "system" fn mock_destroy_device(_device: vk::VkDevice, _allocator: *const c_void) {
    with_state(|state| state.devices_destroyed += 1);
}

unsafe extern "system" fn mock_get_device_queue(
    _device: vk::VkDevice,
    queue_family_index: u32,
    queue_index: u32,
    queue: *mut vk::VkQueue,
) {
    // SAFETY: caller supplies a valid out-pointer.
    unsafe {
        *queue =
            (QUEUE_HANDLE + queue_family_index as usize + queue_index as usize) as vk::VkQueue
    };
}
