//! IL2CPP API bindings
//!
//! Only `il2cpp_init` matters here; everything else runs in the sibling
//! runtime. IL2CPP exports plain cdecl functions.

use std::ffi::c_char;

runtime_api! {
    /// IL2CPP exports used by the bootstrap
    pub struct Il2CppApi("il2cpp_", "C") {
        /// Returns the host's process-domain status, opaque to the bootstrap
        fn init(domain_name: *const c_char) -> i32;
    }
}
