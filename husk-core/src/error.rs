//! Error types for husk-core

use std::path::PathBuf;

use husk_plugin_api::RendererKind;
use husk_plugin_api::vk::VkResult;
use thiserror::Error;

/// Errors from the OS dynamic-library loader boundary.
#[derive(Error, Debug)]
pub enum LoaderError {
    /// The library could not be opened.
    #[error("failed to open library {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    /// No library exists at the given path (mock loaders report this
    /// distinctly from a real open failure).
    #[error("library not found: {path}")]
    NotFound { path: PathBuf },
}

/// Errors that can occur while loading or unloading plugins.
#[derive(Error, Debug)]
pub enum PluginHostError {
    /// Every slot in the plugin table is occupied.
    #[error("plugin table is full ({capacity} slots)")]
    TableFull { capacity: usize },

    /// The handle is stale (its slot has been recycled) or was never issued.
    #[error("invalid or stale plugin handle")]
    InvalidHandle,

    /// The OS loader could not open the plugin library.
    #[error(transparent)]
    Load(#[from] LoaderError),

    /// The host was configured for a renderer it does not implement.
    #[error("renderer kind {kind:?} is not supported")]
    UnsupportedRenderer { kind: RendererKind },
}

/// Errors from the staged Vulkan bootstrap.
///
/// Any variant other than [`BootstrapError::AlreadyActive`] means the attempt
/// rolled back fully: no context was published and every resource acquired
/// during the attempt was released.
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// A graphics context is already active; the sequencer refuses to run
    /// twice.
    #[error("a graphics context is already active")]
    AlreadyActive,

    /// The Vulkan loader library could not be opened.
    #[error("failed to open the vulkan loader library: {0}")]
    LoaderOpen(#[from] LoaderError),

    /// A required entry point was missing from the loader, instance or
    /// device.
    #[error("missing vulkan entry point {name}")]
    MissingEntryPoint { name: String },

    /// `vkCreateInstance` returned an error code.
    #[error("vkCreateInstance failed with {code}")]
    InstanceCreation { code: VkResult },

    /// `vkEnumeratePhysicalDevices` returned an error code.
    #[error("physical device enumeration failed with {code}")]
    Enumeration { code: VkResult },

    /// The enumeration succeeded but reported zero devices.
    #[error("no physical devices available")]
    NoPhysicalDevices,

    /// `vkCreateDevice` returned an error code.
    #[error("vkCreateDevice failed with {code}")]
    DeviceCreation { code: VkResult },
}

/// Errors from reading or writing a [`crate::HostConfig`] file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file exists but is not valid TOML for a host config.
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// The config could not be serialized.
    #[error("failed to serialize config: {0}")]
    Serialize(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_full_display() {
        let err = PluginHostError::TableFull { capacity: 8 };
        assert!(err.to_string().contains("8"));
    }

    #[test]
    fn test_loader_error_display() {
        let err = LoaderError::Open {
            path: PathBuf::from("/tmp/libfoo.so"),
            reason: "not an ELF".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/libfoo.so"));
        assert!(msg.contains("not an ELF"));
    }

    #[test]
    fn test_loader_error_converts_to_plugin_host_error() {
        let err: PluginHostError = LoaderError::NotFound {
            path: PathBuf::from("/nowhere"),
        }
        .into();
        assert!(matches!(err, PluginHostError::Load(_)));
    }

    #[test]
    fn test_missing_entry_point_display() {
        let err = BootstrapError::MissingEntryPoint {
            name: "vkCreateInstance".to_string(),
        };
        assert!(err.to_string().contains("vkCreateInstance"));
    }

    #[test]
    fn test_instance_creation_display_includes_code() {
        let err = BootstrapError::InstanceCreation { code: -3 };
        assert!(err.to_string().contains("-3"));
    }

    #[test]
    fn test_unsupported_renderer_display() {
        let err = PluginHostError::UnsupportedRenderer {
            kind: RendererKind::None,
        };
        assert!(err.to_string().contains("None"));
    }
}
