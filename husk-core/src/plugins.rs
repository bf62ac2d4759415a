//! Plugin loading and unloading
//!
//! A plugin is a dynamic library that may export two well-known hooks:
//! [`PLUGIN_LOAD_SYMBOL`], called with the host's capability table right
//! after the library is opened, and [`PLUGIN_UNLOAD_SYMBOL`], called just
//! before it is closed. Both hooks are optional; a library exporting neither
//! is still a valid (if inert) plugin.
//!
//! Loaded plugins are tracked in the host's generational [`HandleTable`], so
//! callers hold opaque [`Handle`]s instead of table indices and a handle kept
//! past its plugin's unload fails validation instead of aliasing a later
//! occupant of the slot.

use std::mem;
use std::path::{Path, PathBuf};

use husk_plugin_api::{
    DeviceEvent, PLUGIN_LOAD_SYMBOL, PLUGIN_UNLOAD_SYMBOL, PluginLoadFn, PluginUnloadFn,
};

use crate::error::PluginHostError;
use crate::handles::Handle;
use crate::host::Host;
use crate::loader::{RawSymbol, SharedLibrary};
use crate::vulkan::RendererState;

/// A plugin library held open by the host.
pub(crate) struct LoadedModule {
    path: PathBuf,
    unload: Option<PluginUnloadFn>,
    library: Box<dyn SharedLibrary>,
}

impl LoadedModule {
    /// Run the unload hook (if any) and close the library.
    fn shutdown(self) {
        if let Some(unload) = self.unload {
            tracing::debug!(path = %self.path.display(), "invoking plugin unload hook");
            // SAFETY: the hook was resolved from this library, which is
            // still open; the ABI defines its signature.
            unsafe { unload() };
        }
        // Dropping `library` closes it.
    }
}

impl Host {
    /// Load a plugin library and invoke its load hook.
    ///
    /// The returned handle stays valid until [`Host::unload_plugin`] releases
    /// it (or the host is dropped). Fails without side effects when the
    /// plugin table is full or the library cannot be opened.
    pub fn load_plugin(&self, path: &Path) -> Result<Handle, PluginHostError> {
        let capacity = self.inner.modules.borrow().capacity();
        if self.inner.modules.borrow().is_full() {
            return Err(PluginHostError::TableFull { capacity });
        }

        let library = self.inner.loader.open(path)?;

        // SAFETY: transmuting a resolved export to the hook type the ABI
        // declares for that symbol name.
        let load = library
            .symbol(PLUGIN_LOAD_SYMBOL)
            .map(|raw| unsafe { mem::transmute::<RawSymbol, PluginLoadFn>(raw) });
        let unload = library
            .symbol(PLUGIN_UNLOAD_SYMBOL)
            .map(|raw| unsafe { mem::transmute::<RawSymbol, PluginUnloadFn>(raw) });

        let module = LoadedModule {
            path: path.to_path_buf(),
            unload,
            library,
        };
        let handle = self
            .inner
            .modules
            .borrow_mut()
            .insert(module)
            .ok_or(PluginHostError::TableFull { capacity })?;

        tracing::info!(
            path = %path.display(),
            handle = handle.to_raw(),
            has_load_hook = load.is_some(),
            has_unload_hook = unload.is_some(),
            "plugin loaded"
        );

        // No borrows held here: the load hook may re-enter the host through
        // the capability table, including loading further plugins.
        if let Some(load) = load {
            // SAFETY: hook resolved from the library just opened; the table
            // pointer is valid for the host's lifetime.
            unsafe { load(self.interfaces()) };
        }

        Ok(handle)
    }

    /// Resolve an arbitrary export from a loaded plugin. `Ok(None)` means the
    /// plugin does not export `name`; `Err` means the handle is stale.
    pub fn plugin_proc_address(
        &self,
        handle: Handle,
        name: &str,
    ) -> Result<Option<RawSymbol>, PluginHostError> {
        let modules = self.inner.modules.borrow();
        let module = modules.get(handle).ok_or(PluginHostError::InvalidHandle)?;
        Ok(module.library.symbol(name))
    }

    /// Unload a plugin: run its unload hook, close its library and release
    /// its slot. The handle (and any copy of it) is invalid afterwards.
    pub fn unload_plugin(&self, handle: Handle) -> Result<(), PluginHostError> {
        let module = self
            .inner
            .modules
            .borrow_mut()
            .remove(handle)
            .ok_or(PluginHostError::InvalidHandle)?;
        tracing::info!(path = %module.path.display(), "plugin unloaded");
        module.shutdown();
        Ok(())
    }

    /// Number of currently loaded plugins.
    pub fn plugin_count(&self) -> usize {
        self.inner.modules.borrow().len()
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        // Callbacks get the shutdown event while the graphics context still
        // exists, then the renderer tears down, then plugins unload.
        if !matches!(*self.inner.renderer.borrow(), RendererState::Inactive) {
            self.notify_device_event(DeviceEvent::Shutdown);
            *self.inner.renderer.borrow_mut() = RendererState::Inactive;
        }
        let modules = self.inner.modules.borrow_mut().drain();
        for module in modules {
            module.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use husk_plugin_api::HostInterfaces;

    use super::*;
    use crate::config::HostConfig;
    use crate::loader::MockLoader;

    thread_local! {
        static LOAD_CALLS: Cell<usize> = const { Cell::new(0) };
        static UNLOAD_CALLS: Cell<usize> = const { Cell::new(0) };
    }

    unsafe extern "C" fn probe_load(interfaces: *const HostInterfaces) {
        assert!(!interfaces.is_null());
        LOAD_CALLS.with(|calls| calls.set(calls.get() + 1));
    }

    unsafe extern "C" fn probe_unload() {
        UNLOAD_CALLS.with(|calls| calls.set(calls.get() + 1));
    }

    fn reset_counters() {
        LOAD_CALLS.with(|calls| calls.set(0));
        UNLOAD_CALLS.with(|calls| calls.set(0));
    }

    fn load_sym() -> RawSymbol {
        probe_load as PluginLoadFn as usize as RawSymbol
    }

    fn unload_sym() -> RawSymbol {
        probe_unload as PluginUnloadFn as usize as RawSymbol
    }

    fn host_with(loader: &MockLoader) -> Host {
        Host::with_loader(HostConfig::default(), Box::new(loader.clone())).unwrap()
    }

    #[test]
    fn test_load_invokes_hook_and_unload_pairs() {
        reset_counters();
        let loader = MockLoader::new();
        loader.add_library(
            "libprobe.so",
            &[
                (PLUGIN_LOAD_SYMBOL, load_sym()),
                (PLUGIN_UNLOAD_SYMBOL, unload_sym()),
            ],
        );

        let host = host_with(&loader);
        let handle = host.load_plugin(Path::new("libprobe.so")).unwrap();
        assert_eq!(LOAD_CALLS.with(Cell::get), 1);
        assert_eq!(host.plugin_count(), 1);

        host.unload_plugin(handle).unwrap();
        assert_eq!(UNLOAD_CALLS.with(Cell::get), 1);
        assert_eq!(host.plugin_count(), 0);
        assert_eq!(loader.closed(), 1);
    }

    #[test]
    fn test_hookless_library_is_a_valid_plugin() {
        let loader = MockLoader::new();
        loader.add_library("libinert.so", &[]);

        let host = host_with(&loader);
        let handle = host.load_plugin(Path::new("libinert.so")).unwrap();
        assert_eq!(host.plugin_count(), 1);
        host.unload_plugin(handle).unwrap();
    }

    #[test]
    fn test_stale_handle_is_rejected() {
        let loader = MockLoader::new();
        loader.add_library("liba.so", &[]);

        let host = host_with(&loader);
        let handle = host.load_plugin(Path::new("liba.so")).unwrap();
        host.unload_plugin(handle).unwrap();

        assert!(matches!(
            host.unload_plugin(handle),
            Err(PluginHostError::InvalidHandle)
        ));
        assert!(matches!(
            host.plugin_proc_address(handle, "anything"),
            Err(PluginHostError::InvalidHandle)
        ));
    }

    #[test]
    fn test_proc_address_resolves_exports() {
        let loader = MockLoader::new();
        loader.add_library("liba.so", &[("custom_export", 0x7777 as RawSymbol)]);

        let host = host_with(&loader);
        let handle = host.load_plugin(Path::new("liba.so")).unwrap();

        let address = host.plugin_proc_address(handle, "custom_export").unwrap();
        assert_eq!(address, Some(0x7777 as RawSymbol));
        let missing = host.plugin_proc_address(handle, "nope").unwrap();
        assert_eq!(missing, None);
    }

    #[test]
    fn test_table_exhaustion() {
        let loader = MockLoader::new();
        loader.add_library("liba.so", &[]);

        let config = HostConfig {
            max_plugins: 2,
            ..HostConfig::default()
        };
        let host = Host::with_loader(config, Box::new(loader.clone())).unwrap();
        host.load_plugin(Path::new("liba.so")).unwrap();
        host.load_plugin(Path::new("liba.so")).unwrap();

        let result = host.load_plugin(Path::new("liba.so"));
        assert!(matches!(
            result,
            Err(PluginHostError::TableFull { capacity: 2 })
        ));
        // The refused attempt must not have opened a library.
        assert_eq!(loader.opened(), 2);
    }

    #[test]
    fn test_open_failure_has_no_side_effects() {
        let loader = MockLoader::new();
        let host = host_with(&loader);

        let result = host.load_plugin(Path::new("libmissing.so"));
        assert!(matches!(result, Err(PluginHostError::Load(_))));
        assert_eq!(host.plugin_count(), 0);
    }

    #[test]
    fn test_host_drop_unloads_surviving_plugins() {
        reset_counters();
        let loader = MockLoader::new();
        loader.add_library("liba.so", &[(PLUGIN_UNLOAD_SYMBOL, unload_sym())]);

        let host = host_with(&loader);
        host.load_plugin(Path::new("liba.so")).unwrap();
        host.load_plugin(Path::new("liba.so")).unwrap();

        drop(host);
        assert_eq!(UNLOAD_CALLS.with(Cell::get), 2);
        assert_eq!(loader.closed(), 2);
    }

    #[test]
    fn test_slot_reuse_mints_fresh_generation() {
        let loader = MockLoader::new();
        loader.add_library("liba.so", &[]);

        let config = HostConfig {
            max_plugins: 1,
            ..HostConfig::default()
        };
        let host = Host::with_loader(config, Box::new(loader)).unwrap();

        let first = host.load_plugin(Path::new("liba.so")).unwrap();
        host.unload_plugin(first).unwrap();
        let second = host.load_plugin(Path::new("liba.so")).unwrap();

        assert_ne!(first.to_raw(), second.to_raw());
        assert!(host.plugin_proc_address(first, "x").is_err());
        assert!(host.plugin_proc_address(second, "x").is_ok());
    }
}
