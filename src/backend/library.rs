//! Shared-library handles
//!
//! This is the only platform-conditional piece of the crate: opening a
//! runtime library and resolving symbols from it. Everything above works
//! through [`SymbolSource`].

use std::ffi::c_void;
use std::mem::ManuallyDrop;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use libloading::Library;
use log::trace;

use super::traits::{LibraryLoader, SymbolSource};
use crate::error::BootstrapError;

fn resolve_in(library: &Library, name: &str) -> Option<NonNull<c_void>> {
    let symbol = unsafe { library.get::<*mut c_void>(name.as_bytes()) }.ok()?;
    NonNull::new(*symbol)
}

/// A runtime library opened by the bootstrap itself
///
/// Closed on drop. Libraries whose bindings get published are leaked on
/// purpose so they stay mapped until process exit.
#[derive(Debug)]
pub struct SharedLibrary {
    library: Library,
    path: PathBuf,
}

impl SharedLibrary {
    /// Open `path` with lazy symbol binding
    #[cfg(unix)]
    pub fn open_lazy(path: &Path) -> Result<Self, BootstrapError> {
        let library = unsafe { libloading::os::unix::Library::open(Some(path), libc::RTLD_LAZY) }
            .map_err(|e| BootstrapError::LibraryLoad {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        Ok(SharedLibrary {
            library: library.into(),
            path: path.to_path_buf(),
        })
    }

    /// Open `path`; the Windows loader always binds imports lazily through the IAT
    #[cfg(windows)]
    pub fn open_lazy(path: &Path) -> Result<Self, BootstrapError> {
        let library = unsafe { Library::new(path) }.map_err(|e| BootstrapError::LibraryLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(SharedLibrary {
            library,
            path: path.to_path_buf(),
        })
    }
}

impl SymbolSource for SharedLibrary {
    fn resolve(&self, name: &str) -> Option<NonNull<c_void>> {
        let address = resolve_in(&self.library, name);
        trace!("{}: {} -> {:?}", self.path.display(), name, address);
        address
    }
}

/// A module handle owned by the host (e.g. the one passed to its `dlsym`)
///
/// Never closed: the host holds the reference count.
pub struct BorrowedModule {
    library: ManuallyDrop<Library>,
}

impl BorrowedModule {
    /// Wrap a raw `dlopen`/`LoadLibrary` handle
    ///
    /// # Safety
    /// `handle` must be a live module handle for the whole process lifetime.
    pub unsafe fn from_raw(handle: *mut c_void) -> Self {
        #[cfg(unix)]
        let library: Library = libloading::os::unix::Library::from_raw(handle).into();

        #[cfg(windows)]
        let library: Library = libloading::os::windows::Library::from_raw(handle as _).into();

        BorrowedModule {
            library: ManuallyDrop::new(library),
        }
    }
}

impl SymbolSource for BorrowedModule {
    fn resolve(&self, name: &str) -> Option<NonNull<c_void>> {
        resolve_in(&self.library, name)
    }
}

/// Loads runtime libraries through the operating-system loader
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLoader;

impl LibraryLoader for SystemLoader {
    type Library = SharedLibrary;

    fn open_lazy(&self, path: &Path) -> Result<SharedLibrary, BootstrapError> {
        SharedLibrary::open_lazy(path)
    }
}
