//! Host configuration

use std::path::{Path, PathBuf};

use husk_plugin_api::RendererKind;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Serde mirror for [`RendererKind`], which lives in the dependency-free ABI
/// crate.
#[derive(Serialize, Deserialize)]
#[serde(remote = "RendererKind", rename_all = "lowercase")]
enum RendererKindDef {
    None,
    Vulkan,
}

/// Configuration for a [`crate::Host`].
///
/// Stored as TOML when persisted:
///
/// ```toml
/// renderer = "vulkan"
/// max_plugins = 8
/// vulkan_loader = "/usr/lib/libvulkan.so.1"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Graphics backend the host emulates. Only Vulkan is implemented.
    #[serde(with = "RendererKindDef")]
    pub renderer: RendererKind,
    /// Capacity of the plugin handle table. Zero selects the default (8).
    pub max_plugins: usize,
    /// Override for the Vulkan loader library path. `None` uses the
    /// platform's conventional name.
    pub vulkan_loader: Option<PathBuf>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            renderer: RendererKind::Vulkan,
            max_plugins: 8,
            vulkan_loader: None,
        }
    }
}

impl HostConfig {
    /// Load a config from a TOML file. A missing file yields the default.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save the config as TOML, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        if let Some(parent) = path.parent().filter(|p| !p.exists()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// The Vulkan loader library to open: the configured override, or the
    /// platform's conventional name.
    pub fn vulkan_loader_path(&self) -> PathBuf {
        match &self.vulkan_loader {
            Some(path) => path.clone(),
            None => PathBuf::from(default_vulkan_loader()),
        }
    }
}

fn default_vulkan_loader() -> &'static str {
    if cfg!(target_os = "windows") {
        "vulkan-1.dll"
    } else if cfg!(target_os = "macos") {
        "libvulkan.1.dylib"
    } else {
        "libvulkan.so.1"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = HostConfig::default();
        assert_eq!(config.renderer, RendererKind::Vulkan);
        assert_eq!(config.max_plugins, 8);
        assert!(config.vulkan_loader.is_none());
    }

    #[test]
    fn test_load_missing_file_yields_default() {
        let config = HostConfig::load(Path::new("/nonexistent/husk.toml")).unwrap();
        assert_eq!(config.max_plugins, 8);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("host.toml");

        let config = HostConfig {
            renderer: RendererKind::Vulkan,
            max_plugins: 4,
            vulkan_loader: Some(PathBuf::from("/opt/vk/libvulkan.so.1")),
        };
        config.save(&path).unwrap();

        let loaded = HostConfig::load(&path).unwrap();
        assert_eq!(loaded.max_plugins, 4);
        assert_eq!(
            loaded.vulkan_loader.as_deref(),
            Some(Path::new("/opt/vk/libvulkan.so.1"))
        );
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/config/host.toml");
        HostConfig::default().save(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_renderer_parses_from_string() {
        let config: HostConfig = toml::from_str(r#"renderer = "vulkan""#).unwrap();
        assert_eq!(config.renderer, RendererKind::Vulkan);
        let config: HostConfig = toml::from_str(r#"renderer = "none""#).unwrap();
        assert_eq!(config.renderer, RendererKind::None);
    }

    #[test]
    fn test_default_loader_path_is_platform_conventional() {
        let config = HostConfig::default();
        let path = config.vulkan_loader_path();
        assert!(path.to_string_lossy().contains("vulkan"));
    }
}
