//! CoreCLR hosting API bindings (`coreclrhost.h`)

use std::ffi::{c_char, c_void};

/// Managed entry point produced by `coreclr_create_delegate`
pub type EntryPointFn = unsafe extern "system" fn() -> i32;

runtime_api! {
    /// CoreCLR exports used by the bootstrap
    pub struct CoreClrApi("coreclr_", "system") {
        fn initialize(
            exe_path: *const c_char,
            app_domain_friendly_name: *const c_char,
            property_count: i32,
            property_keys: *const *const c_char,
            property_values: *const *const c_char,
            host_handle: *mut *mut c_void,
            domain_id: *mut u32,
        ) -> i32;
        fn create_delegate(
            host_handle: *mut c_void,
            domain_id: u32,
            entry_point_assembly_name: *const c_char,
            entry_point_type_name: *const c_char,
            entry_point_method_name: *const c_char,
            delegate: *mut *mut c_void,
        ) -> i32;
    }
}
