//! Mono embedding API bindings
//!
//! Slot names are the exported `mono_*` symbols without their prefix.
//! Mono uses stdcall on 32-bit Windows, hence `extern "system"`.

use std::ffi::{c_char, c_void};

/// `MonoImageOpenStatus`
pub type ImageOpenStatus = i32;

pub const MONO_IMAGE_OK: ImageOpenStatus = 0;
pub const MONO_IMAGE_ERROR_ERRNO: ImageOpenStatus = 1;
pub const MONO_IMAGE_MISSING_ASSEMBLYREF: ImageOpenStatus = 2;
pub const MONO_IMAGE_IMAGE_INVALID: ImageOpenStatus = 3;

/// `mono_image_open_from_data_with_name`
pub type ImageOpenFn = unsafe extern "system" fn(
    data: *mut c_char,
    data_len: u32,
    need_copy: i32,
    status: *mut ImageOpenStatus,
    refonly: i32,
    name: *const c_char,
) -> *mut c_void;

runtime_api! {
    /// Mono exports used by the bootstrap
    pub struct MonoApi("mono_", "system") {
        fn jit_init_version(root_domain_name: *const c_char, runtime_version: *const c_char) -> *mut c_void;
        fn thread_current() -> *mut c_void;
        fn thread_set_main(thread: *mut c_void);
        fn set_assemblies_path(path: *const c_char);
        fn assembly_getrootdir() -> *const c_char;
        fn image_open_from_data_with_name(
            data: *mut c_char,
            data_len: u32,
            need_copy: i32,
            status: *mut ImageOpenStatus,
            refonly: i32,
            name: *const c_char,
        ) -> *mut c_void;
        fn assembly_load_from_full(
            image: *mut c_void,
            fname: *const c_char,
            status: *mut ImageOpenStatus,
            refonly: i32,
        ) -> *mut c_void;
        fn method_desc_new(name: *const c_char, include_namespace: i32) -> *mut c_void;
        fn method_desc_search_in_image(desc: *mut c_void, image: *mut c_void) -> *mut c_void;
        fn method_desc_free(desc: *mut c_void);
        fn method_signature(method: *mut c_void) -> *mut c_void;
        fn signature_get_param_count(signature: *mut c_void) -> u32;
        fn array_new(domain: *mut c_void, class: *mut c_void, n: usize) -> *mut c_void;
        fn get_string_class() -> *mut c_void;
        fn runtime_invoke(
            method: *mut c_void,
            obj: *mut c_void,
            params: *mut *mut c_void,
            exc: *mut *mut c_void,
        ) -> *mut c_void;
        fn string_to_utf8(string: *mut c_void) -> *mut c_char;
        fn set_dirs(assembly_dir: *const c_char, config_dir: *const c_char);
        fn config_parse(filename: *const c_char);
        /// Optional: absent on older Mono builds
        fn domain_set_config(domain: *mut c_void, base_dir: *const c_char, config_file_name: *const c_char);
        /// Optional: absent on stripped Mono builds
        fn object_to_string(obj: *mut c_void, exc: *mut *mut c_void) -> *mut c_void;
        /// Optional: releases strings returned by `string_to_utf8`
        fn free(ptr: *mut c_void);
    }
}
