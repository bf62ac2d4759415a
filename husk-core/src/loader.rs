//! OS dynamic-library loader boundary
//!
//! The host depends on exactly three loader operations: open a library,
//! resolve a symbol, close the library. [`LibraryLoader`] and
//! [`SharedLibrary`] capture that contract; closing is the library's `Drop`.
//!
//! [`SystemLoader`] is the real implementation on top of `libloading`.
//! [`MockLoader`] serves in-process symbol tables so plugin loading and the
//! graphics bootstrap can be exercised without touching the filesystem or a
//! real driver.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use libloading::Library;

use crate::error::LoaderError;

/// An untyped symbol address. Callers transmute it to the exported type.
pub type RawSymbol = *mut c_void;

/// An opened dynamic library. Dropping it closes the library.
pub trait SharedLibrary {
    /// Resolve `name`, or `None` when the library does not export it.
    fn symbol(&self, name: &str) -> Option<RawSymbol>;
}

/// The open half of the loader contract.
pub trait LibraryLoader {
    fn open(&self, path: &Path) -> Result<Box<dyn SharedLibrary>, LoaderError>;
}

// ─── System loader ───────────────────────────────────────────────────

/// Loader backed by the platform's dynamic linker.
#[derive(Default)]
pub struct SystemLoader;

impl SystemLoader {
    pub fn new() -> Self {
        Self
    }
}

impl LibraryLoader for SystemLoader {
    fn open(&self, path: &Path) -> Result<Box<dyn SharedLibrary>, LoaderError> {
        // SAFETY: opening a library runs its initializers. The caller chose
        // to load this module; there is nothing the host can check beyond
        // the open succeeding.
        let library = unsafe { Library::new(path) }.map_err(|e| LoaderError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Box::new(SystemLibrary { library }))
    }
}

struct SystemLibrary {
    library: Library,
}

impl SharedLibrary for SystemLibrary {
    fn symbol(&self, name: &str) -> Option<RawSymbol> {
        // SAFETY: the symbol is returned as an opaque address; whoever
        // transmutes it to a concrete type owns the signature contract.
        let symbol = unsafe { self.library.get::<*mut c_void>(name.as_bytes()) }.ok()?;
        // SAFETY: the address is only handed on as an opaque pointer, never
        // dereferenced here.
        unsafe { symbol.try_as_raw_ptr() }.filter(|ptr| !ptr.is_null())
    }
}

// ─── Mock loader ─────────────────────────────────────────────────────

#[derive(Default)]
struct MockLoaderState {
    libraries: HashMap<PathBuf, HashMap<String, RawSymbol>>,
    opened: usize,
    closed: usize,
}

/// In-process loader for tests: libraries are symbol tables registered up
/// front, and open/close pairs are counted so resource rollback can be
/// asserted.
///
/// Clones share state, so a test can keep one handle for inspection while the
/// host owns another.
#[derive(Clone, Default)]
pub struct MockLoader {
    state: Rc<RefCell<MockLoaderState>>,
}

impl MockLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a library under `path` with the given exported symbols.
    pub fn add_library(&self, path: impl Into<PathBuf>, symbols: &[(&str, RawSymbol)]) {
        let symbols = symbols
            .iter()
            .map(|(name, address)| ((*name).to_string(), *address))
            .collect();
        self.state
            .borrow_mut()
            .libraries
            .insert(path.into(), symbols);
    }

    /// How many libraries have been opened so far.
    pub fn opened(&self) -> usize {
        self.state.borrow().opened
    }

    /// How many opened libraries have been closed again.
    pub fn closed(&self) -> usize {
        self.state.borrow().closed
    }
}

impl LibraryLoader for MockLoader {
    fn open(&self, path: &Path) -> Result<Box<dyn SharedLibrary>, LoaderError> {
        let symbols = self
            .state
            .borrow()
            .libraries
            .get(path)
            .cloned()
            .ok_or_else(|| LoaderError::NotFound {
                path: path.to_path_buf(),
            })?;
        self.state.borrow_mut().opened += 1;
        Ok(Box::new(MockLibrary {
            symbols,
            state: Rc::clone(&self.state),
        }))
    }
}

struct MockLibrary {
    symbols: HashMap<String, RawSymbol>,
    state: Rc<RefCell<MockLoaderState>>,
}

impl SharedLibrary for MockLibrary {
    fn symbol(&self, name: &str) -> Option<RawSymbol> {
        self.symbols.get(name).copied()
    }
}

impl Drop for MockLibrary {
    fn drop(&mut self) {
        self.state.borrow_mut().closed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_loader_open_missing_library_fails() {
        let loader = SystemLoader::new();
        let result = loader.open(Path::new("/nonexistent/libhusk_missing.so"));
        assert!(matches!(result, Err(LoaderError::Open { .. })));
    }

    #[test]
    fn test_mock_loader_open_unknown_path() {
        let loader = MockLoader::new();
        let result = loader.open(Path::new("libnothing.so"));
        assert!(matches!(result, Err(LoaderError::NotFound { .. })));
        assert_eq!(loader.opened(), 0);
    }

    #[test]
    fn test_mock_loader_resolves_registered_symbols() {
        let loader = MockLoader::new();
        loader.add_library("libfake.so", &[("hello", 0x1234 as RawSymbol)]);

        let library = loader.open(Path::new("libfake.so")).unwrap();
        assert_eq!(library.symbol("hello"), Some(0x1234 as RawSymbol));
        assert_eq!(library.symbol("goodbye"), None);
    }

    #[test]
    fn test_mock_loader_counts_open_and_close() {
        let loader = MockLoader::new();
        loader.add_library("libfake.so", &[]);

        let library = loader.open(Path::new("libfake.so")).unwrap();
        assert_eq!(loader.opened(), 1);
        assert_eq!(loader.closed(), 0);

        drop(library);
        assert_eq!(loader.closed(), 1);
    }

    #[test]
    fn test_mock_loader_clones_share_state() {
        let loader = MockLoader::new();
        let observer = loader.clone();
        loader.add_library("libfake.so", &[]);

        let _library = observer.open(Path::new("libfake.so")).unwrap();
        assert_eq!(loader.opened(), 1);
    }
}
