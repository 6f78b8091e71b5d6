//! Seams between the bootstrap and the process it runs in
//!
//! The bootstrap never talks to the operating-system loader or to the
//! environment block directly. It goes through these traits so the same
//! state machine runs against a real runtime library or against test stubs.

use std::ffi::{c_void, OsStr, OsString};
use std::path::Path;
use std::ptr::NonNull;

use crate::error::BootstrapError;

/// Anything that can resolve an exported symbol name to an address
pub trait SymbolSource {
    /// Resolve `name` (without trailing NUL) to the symbol's address
    fn resolve(&self, name: &str) -> Option<NonNull<c_void>>;
}

/// Opens runtime shared libraries from disk
pub trait LibraryLoader {
    /// The opened library; it stays open until process exit once handed out
    type Library: SymbolSource + Send + Sync + 'static;

    /// Open the library at `path` with lazy symbol binding
    fn open_lazy(&self, path: &Path) -> Result<Self::Library, BootstrapError>;
}

/// Process-wide environment variable storage
pub trait EnvStore {
    /// Read a variable, `None` when it is not set
    fn get(&self, key: &str) -> Option<OsString>;

    /// Set (or overwrite) a variable
    fn set(&self, key: &str, value: &OsStr);

    /// Check whether a variable is present at all
    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// Reinterpret a resolved symbol address as a typed function pointer
///
/// # Safety
/// `F` must be a function pointer type whose signature and calling
/// convention match the symbol at `address`.
pub unsafe fn cast_symbol<F: Copy>(address: NonNull<c_void>) -> F {
    debug_assert_eq!(
        std::mem::size_of::<F>(),
        std::mem::size_of::<*mut c_void>()
    );
    std::mem::transmute_copy(&address)
}
