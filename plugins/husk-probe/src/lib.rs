//! husk-probe - diagnostic plugin for the husk host
//!
//! Exercises every surface a plugin can reach: on load it discovers the
//! graphics and Vulkan interfaces, registers a device-event callback and an
//! interception hook, and publishes its own counter interface so the
//! embedder can see what the plugin observed.
//!
//! Counters are process-wide atomics because the ABI callbacks carry no
//! userdata. Call [`reset_counters`] between host runs when embedding the
//! probe as a Rust library.

use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicU32, Ordering};

use husk_plugin_api::{
    DeviceEvent, GraphicsInterface, HostInterfaces, InterfaceId, VulkanInterface, ids, vk,
};

/// Id the probe publishes its [`ProbeInterface`] under.
pub const PROBE_INTERFACE_ID: InterfaceId = InterfaceId::new(0x6875_736b_7072_6f62, 0x0000_0000_0000_0001);

static LOADS: AtomicU32 = AtomicU32::new(0);
static UNLOADS: AtomicU32 = AtomicU32::new(0);
static INITIALIZE_EVENTS: AtomicU32 = AtomicU32::new(0);
static SHUTDOWN_EVENTS: AtomicU32 = AtomicU32::new(0);
static INTERCEPTIONS: AtomicU32 = AtomicU32::new(0);

/// Counter surface the probe publishes for embedders.
#[repr(C)]
pub struct ProbeInterface {
    pub loads: unsafe extern "C" fn() -> u32,
    pub unloads: unsafe extern "C" fn() -> u32,
    pub initialize_events: unsafe extern "C" fn() -> u32,
    pub shutdown_events: unsafe extern "C" fn() -> u32,
    pub interceptions: unsafe extern "C" fn() -> u32,
}

static PROBE: ProbeInterface = ProbeInterface {
    loads: probe_loads,
    unloads: probe_unloads,
    initialize_events: probe_initialize_events,
    shutdown_events: probe_shutdown_events,
    interceptions: probe_interceptions,
};

unsafe extern "C" fn probe_loads() -> u32 {
    LOADS.load(Ordering::SeqCst)
}

unsafe extern "C" fn probe_unloads() -> u32 {
    UNLOADS.load(Ordering::SeqCst)
}

unsafe extern "C" fn probe_initialize_events() -> u32 {
    INITIALIZE_EVENTS.load(Ordering::SeqCst)
}

unsafe extern "C" fn probe_shutdown_events() -> u32 {
    SHUTDOWN_EVENTS.load(Ordering::SeqCst)
}

unsafe extern "C" fn probe_interceptions() -> u32 {
    INTERCEPTIONS.load(Ordering::SeqCst)
}

/// Zero all counters. For embedders that run the probe more than once.
pub fn reset_counters() {
    LOADS.store(0, Ordering::SeqCst);
    UNLOADS.store(0, Ordering::SeqCst);
    INITIALIZE_EVENTS.store(0, Ordering::SeqCst);
    SHUTDOWN_EVENTS.store(0, Ordering::SeqCst);
    INTERCEPTIONS.store(0, Ordering::SeqCst);
}

unsafe extern "C" fn on_device_event(event: DeviceEvent) {
    let counter = match event {
        DeviceEvent::Initialize => &INITIALIZE_EVENTS,
        DeviceEvent::Shutdown => &SHUTDOWN_EVENTS,
        DeviceEvent::BeforeReset | DeviceEvent::AfterReset => return,
    };
    counter.fetch_add(1, Ordering::SeqCst);
}

unsafe extern "system" fn on_vulkan_init(
    _get_instance_proc_addr: vk::PfnGetInstanceProcAddr,
    _userdata: *mut c_void,
) -> Option<vk::PfnGetInstanceProcAddr> {
    INTERCEPTIONS.fetch_add(1, Ordering::SeqCst);
    // Observe only; keep the host's resolver.
    None
}

/// Load hook. The host calls this right after opening the library.
///
/// # Safety
///
/// `interfaces` must be the live capability table of the calling host.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn husk_plugin_load(interfaces: *const HostInterfaces) {
    if interfaces.is_null() {
        return;
    }
    LOADS.fetch_add(1, Ordering::SeqCst);
    // SAFETY: the host keeps the table alive for its own lifetime.
    let interfaces = unsafe { &*interfaces };

    // SAFETY: pointers returned by lookup are the host's interface tables.
    unsafe {
        let graphics = interfaces.lookup(ids::GRAPHICS).cast::<GraphicsInterface>();
        if !graphics.is_null() {
            (*graphics).add_device_event_callback(on_device_event);
        }

        let vulkan = interfaces
            .lookup(ids::GRAPHICS_VULKAN)
            .cast::<VulkanInterface>();
        if !vulkan.is_null() {
            (*vulkan).intercept(on_vulkan_init, ptr::null_mut());
        }

        interfaces.publish(
            PROBE_INTERFACE_ID,
            ptr::from_ref(&PROBE).cast_mut().cast::<c_void>(),
        );
    }
}

/// Unload hook. The host calls this just before closing the library.
///
/// # Safety
///
/// Must only be called by the host that ran the load hook.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn husk_plugin_unload() {
    UNLOADS.fetch_add(1, Ordering::SeqCst);
}
