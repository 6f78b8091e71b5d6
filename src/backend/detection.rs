//! Runtime flavor detection
//!
//! The flavor is not inspected up front. It is whichever runtime-initialization hook
//! fires first in the process.

use std::ffi::c_void;
use std::sync::OnceLock;

/// The managed runtime the host is bringing up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeFlavor {
    /// Mono embedded directly by the host
    Mono,
    /// IL2CPP host; user code runs on a sibling runtime
    Il2Cpp,
    /// .NET CoreCLR
    CoreClr,
}

impl std::fmt::Display for RuntimeFlavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeFlavor::Mono => write!(f, "Mono"),
            RuntimeFlavor::Il2Cpp => write!(f, "IL2CPP"),
            RuntimeFlavor::CoreClr => write!(f, "CoreCLR"),
        }
    }
}

/// One-shot record of the flavor that fired first
#[derive(Debug, Default)]
pub struct FlavorLatch(OnceLock<RuntimeFlavor>);

impl FlavorLatch {
    pub const fn new() -> Self {
        FlavorLatch(OnceLock::new())
    }

    /// Claim the process for `flavor`
    ///
    /// Returns `true` when `flavor` is (or already was) the detected one,
    /// `false` when another flavor got there first.
    pub fn claim(&self, flavor: RuntimeFlavor) -> bool {
        *self.0.get_or_init(|| flavor) == flavor
    }

    pub fn get(&self) -> Option<RuntimeFlavor> {
        self.0.get().copied()
    }
}

/// Opaque runtime object pointer tagged with the flavor that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagedHandle {
    raw: *mut c_void,
    flavor: RuntimeFlavor,
}

impl ManagedHandle {
    pub fn new(raw: *mut c_void, flavor: RuntimeFlavor) -> Self {
        ManagedHandle { raw, flavor }
    }

    pub fn mono(raw: *mut c_void) -> Self {
        Self::new(raw, RuntimeFlavor::Mono)
    }

    pub fn flavor(&self) -> RuntimeFlavor {
        self.flavor
    }

    pub fn is_null(&self) -> bool {
        self.raw.is_null()
    }

    /// Unwrap for a call into the runtime of `flavor`
    pub fn as_raw(&self, flavor: RuntimeFlavor) -> *mut c_void {
        debug_assert_eq!(self.flavor, flavor, "handle passed to the wrong runtime");
        self.raw
    }
}
