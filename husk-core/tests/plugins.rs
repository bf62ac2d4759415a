//! Integration tests for the plugin lifecycle against a live host
//!
//! A fake plugin is built out of extern "C" functions and thread-local
//! counters, registered with the mock loader under well-known symbol names.
//! Its hooks interact with the host exclusively through the capability
//! tables, the way a real cdylib plugin would.

use std::cell::Cell;
use std::path::{Path, PathBuf};

use husk_core::{BootstrapOptions, Host, HostConfig, MockLoader, MockVulkan, RawSymbol};
use husk_plugin_api::{
    DeviceEvent, DeviceEventCallback, GraphicsInterface, HostInterfaces, PLUGIN_LOAD_SYMBOL,
    PLUGIN_UNLOAD_SYMBOL, PluginLoadFn, PluginUnloadFn, ids,
};

const LOADER_PATH: &str = "libvulkan-mock.so.1";
const PLUGIN_PATH: &str = "libfake-plugin.so";

thread_local! {
    static GRAPHICS_TABLE: Cell<usize> = const { Cell::new(0) };
    static INITIALIZE_EVENTS: Cell<u32> = const { Cell::new(0) };
    static SHUTDOWN_EVENTS: Cell<u32> = const { Cell::new(0) };
}

fn reset_plugin_state() {
    GRAPHICS_TABLE.with(|table| table.set(0));
    INITIALIZE_EVENTS.with(|count| count.set(0));
    SHUTDOWN_EVENTS.with(|count| count.set(0));
}

unsafe extern "C" fn counting_callback(event: DeviceEvent) {
    match event {
        DeviceEvent::Initialize => {
            INITIALIZE_EVENTS.with(|count| count.set(count.get() + 1));
        }
        DeviceEvent::Shutdown => {
            SHUTDOWN_EVENTS.with(|count| count.set(count.get() + 1));
        }
        DeviceEvent::BeforeReset | DeviceEvent::AfterReset => {}
    }
}

unsafe extern "C" fn fake_plugin_load(interfaces: *const HostInterfaces) {
    // SAFETY: the host passes its live table and keeps it alive.
    let interfaces = unsafe { &*interfaces };
    // SAFETY: the graphics id is registered by every host at construction.
    let graphics = unsafe { interfaces.lookup(ids::GRAPHICS) }.cast::<GraphicsInterface>();
    assert!(!graphics.is_null());
    GRAPHICS_TABLE.with(|table| table.set(graphics as usize));
    // SAFETY: table and callback both outlive the registration.
    unsafe { (*graphics).add_device_event_callback(counting_callback) };
}

unsafe extern "C" fn fake_plugin_unload() {
    let graphics = GRAPHICS_TABLE.with(Cell::get) as *const GraphicsInterface;
    // SAFETY: the unload hook runs while the host (and its tables) are live.
    unsafe { (*graphics).remove_device_event_callback(counting_callback) };
}

fn load_symbol() -> RawSymbol {
    fake_plugin_load as PluginLoadFn as usize as RawSymbol
}

fn unload_symbol() -> RawSymbol {
    fake_plugin_unload as PluginUnloadFn as usize as RawSymbol
}

fn mock_host() -> (Host, MockLoader, MockVulkan) {
    let loader = MockLoader::new();
    let mock = MockVulkan::fresh();
    mock.install(&loader, LOADER_PATH);
    loader.add_library(
        PLUGIN_PATH,
        &[
            (PLUGIN_LOAD_SYMBOL, load_symbol()),
            (PLUGIN_UNLOAD_SYMBOL, unload_symbol()),
        ],
    );
    let config = HostConfig {
        vulkan_loader: Some(PathBuf::from(LOADER_PATH)),
        ..HostConfig::default()
    };
    let host = Host::with_loader(config, Box::new(loader.clone())).unwrap();
    (host, loader, mock)
}

#[test]
fn plugin_lifecycle_delivers_initialize_and_skips_after_unload() {
    reset_plugin_state();
    let (host, loader, _mock) = mock_host();

    let handle = host.load_plugin(Path::new(PLUGIN_PATH)).unwrap();
    host.bootstrap_vulkan(&BootstrapOptions::default()).unwrap();
    assert_eq!(INITIALIZE_EVENTS.with(Cell::get), 1);

    // The unload hook unregisters the callback, so teardown's shutdown
    // event never reaches it.
    host.unload_plugin(handle).unwrap();
    drop(host);
    assert_eq!(SHUTDOWN_EVENTS.with(Cell::get), 0);
    assert_eq!(loader.closed(), loader.opened());
}

#[test]
fn surviving_plugin_sees_shutdown_before_its_unload_hook() {
    reset_plugin_state();
    let (host, _loader, _mock) = mock_host();

    host.load_plugin(Path::new(PLUGIN_PATH)).unwrap();
    host.bootstrap_vulkan(&BootstrapOptions::default()).unwrap();

    // Not unloaded explicitly; host drop notifies, then unloads.
    drop(host);
    assert_eq!(INITIALIZE_EVENTS.with(Cell::get), 1);
    assert_eq!(SHUTDOWN_EVENTS.with(Cell::get), 1);
}

#[test]
fn callback_registered_after_bootstrap_misses_initialize() {
    reset_plugin_state();
    let (host, _loader, _mock) = mock_host();

    host.bootstrap_vulkan(&BootstrapOptions::default()).unwrap();
    host.register_device_event_callback(counting_callback);

    drop(host);
    assert_eq!(INITIALIZE_EVENTS.with(Cell::get), 0);
    assert_eq!(SHUTDOWN_EVENTS.with(Cell::get), 1);
}

#[test]
fn duplicate_registrations_fire_once_each() {
    reset_plugin_state();
    let (host, _loader, _mock) = mock_host();

    host.register_device_event_callback(counting_callback);
    host.register_device_event_callback(counting_callback);
    host.bootstrap_vulkan(&BootstrapOptions::default()).unwrap();
    assert_eq!(INITIALIZE_EVENTS.with(Cell::get), 2);
}

// ─── Re-entrancy ─────────────────────────────────────────────────────

thread_local! {
    static SELF_REMOVING_CALLS: Cell<u32> = const { Cell::new(0) };
}

unsafe extern "C" fn self_removing_callback(_event: DeviceEvent) {
    SELF_REMOVING_CALLS.with(|count| count.set(count.get() + 1));
    let graphics = GRAPHICS_TABLE.with(Cell::get) as *const GraphicsInterface;
    // SAFETY: the table pointer was captured from a live host this run.
    unsafe {
        (*graphics).remove_device_event_callback(
            self_removing_callback as DeviceEventCallback,
        );
    }
}

#[test]
fn callback_may_unregister_itself_mid_notification() {
    reset_plugin_state();
    let (host, _loader, _mock) = mock_host();

    let graphics = host.get_interface(ids::GRAPHICS).unwrap();
    GRAPHICS_TABLE.with(|table| table.set(graphics as usize));
    host.register_device_event_callback(self_removing_callback);

    host.bootstrap_vulkan(&BootstrapOptions::default()).unwrap();
    assert_eq!(SELF_REMOVING_CALLS.with(Cell::get), 1);

    // Removed itself during Initialize, so Shutdown does not reach it.
    drop(host);
    assert_eq!(SELF_REMOVING_CALLS.with(Cell::get), 1);
}
