//! husk-core: Host-side emulation of a native plugin engine
//!
//! This crate lets extension modules written against the engine plugin ABI
//! (declared in `husk-plugin-api`) be loaded and exercised outside the real
//! engine:
//!
//! - **Host context** - [`Host`] owns one emulated host instance; no globals,
//!   so independent hosts can coexist
//! - **Interface registry** - 128-bit-keyed capability lookup shared between
//!   the host's built-in interfaces and plugin-published ones
//! - **Plugin loading** - [`Host::load_plugin`] opens a library, runs its
//!   load hook and mints a generational [`Handle`] for it
//! - **Vulkan bootstrap** - [`Host::bootstrap_vulkan`] runs the staged
//!   instance/device bring-up with full rollback on failure, honoring a
//!   plugin-registered interception hook
//! - **Test doubles** - [`MockLoader`] and [`MockVulkan`] run everything
//!   above in-process without a real driver or filesystem
//!
//! # Quick Start
//!
//! ```no_run
//! use husk_core::{BootstrapOptions, Host, HostConfig};
//!
//! fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let host = Host::new(HostConfig::default())?;
//!
//!     // Load a plugin; its load hook sees the host's capability table.
//!     let handle = host.load_plugin(std::path::Path::new("./libmyplugin.so"))?;
//!
//!     // Bring up Vulkan and notify registered device-event callbacks.
//!     let context = host.bootstrap_vulkan(&BootstrapOptions::default())?;
//!     println!("device: {:?}", context.device);
//!
//!     host.unload_plugin(handle)?;
//!     Ok(())
//! }
//! ```

mod callbacks;
pub mod config;
pub mod error;
pub mod handles;
mod host;
pub mod loader;
mod plugins;
mod registry;
pub mod vulkan;

// Re-export key types for convenience
pub use husk_plugin_api::{DeviceEvent, DeviceEventCallback, InterfaceId, RendererKind, ids};

pub use config::HostConfig;
pub use error::{BootstrapError, ConfigError, LoaderError, PluginHostError};
pub use handles::{Handle, HandleTable};
pub use host::Host;
pub use loader::{LibraryLoader, MockLoader, RawSymbol, SharedLibrary, SystemLoader};
pub use vulkan::mock::MockVulkan;
pub use vulkan::{BootstrapOptions, VulkanContext};
