//! Test doubles: in-memory environment, map-backed symbols, temp dirs and
//! stub runtimes that record their calls in thread-local state.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::{c_void, OsStr, OsString};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::backend::{EnvStore, LibraryLoader, SymbolSource};
use crate::error::BootstrapError;

#[derive(Debug, Default)]
pub struct MemoryEnv(RefCell<HashMap<String, OsString>>);

impl MemoryEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.0.borrow_mut().insert(key.to_string(), OsString::from(value));
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string_lossy().into_owned())
    }
}

impl EnvStore for MemoryEnv {
    fn get(&self, key: &str) -> Option<OsString> {
        self.0.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &OsStr) {
        self.0.borrow_mut().insert(key.to_string(), value.to_os_string());
    }
}

#[derive(Debug, Default, Clone)]
pub struct MapSymbols(HashMap<&'static str, usize>);

impl MapSymbols {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'static str, address: *mut c_void) -> Self {
        self.0.insert(name, address as usize);
        self
    }
}

impl SymbolSource for MapSymbols {
    fn resolve(&self, name: &str) -> Option<NonNull<c_void>> {
        self.0.get(name).and_then(|a| NonNull::new(*a as *mut c_void))
    }
}

/// Hands out a fixed symbol map and remembers every path it was asked for
#[derive(Debug, Default)]
pub struct FakeLoader {
    pub symbols: MapSymbols,
    pub opened: RefCell<Vec<PathBuf>>,
}

impl LibraryLoader for FakeLoader {
    type Library = MapSymbols;

    fn open_lazy(&self, path: &Path) -> Result<MapSymbols, BootstrapError> {
        self.opened.borrow_mut().push(path.to_path_buf());
        Ok(self.symbols.clone())
    }
}

/// Directory under the system temp dir, removed on drop
pub struct TempDir(PathBuf);

impl TempDir {
    pub fn new(tag: &str) -> Self {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!("doorstop-{}-{}-{}", tag, std::process::id(), n));
        std::fs::create_dir_all(&path).unwrap();
        TempDir(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn write(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.0.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, bytes).unwrap();
        path
    }

    pub fn mkdir(&self, name: &str) -> PathBuf {
        let path = self.0.join(name);
        std::fs::create_dir_all(&path).unwrap();
        path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Stub Mono runtime
#[cfg(feature = "mono")]
pub mod fake_mono {
    use super::*;
    use crate::mono::api::{ImageOpenStatus, MonoApi, MONO_IMAGE_IMAGE_INVALID, MONO_IMAGE_OK};
    use std::ffi::{c_char, CStr};

    pub const DOMAIN: *mut c_void = 0xD0 as *mut c_void;
    pub const THREAD: *mut c_void = 0x7E as *mut c_void;
    pub const IMAGE: *mut c_void = 0x1A as *mut c_void;
    pub const ASSEMBLY: *mut c_void = 0xA5 as *mut c_void;
    pub const DESC: *mut c_void = 0xDE as *mut c_void;
    pub const METHOD: *mut c_void = 0x3E as *mut c_void;
    pub const SIGNATURE: *mut c_void = 0x51 as *mut c_void;
    pub const STRING_CLASS: *mut c_void = 0x5C as *mut c_void;
    pub const ARRAY: *mut c_void = 0xA7 as *mut c_void;
    pub const EXCEPTION: *mut c_void = 0xE7 as *mut c_void;
    pub const EXCEPTION_STRING: *mut c_void = 0xE5 as *mut c_void;

    pub const ROOT_DIR: &CStr = c"/game/Managed";
    pub const EXCEPTION_TEXT: &CStr = c"System.Exception: boom";

    /// What the stubs were told to do and what they saw
    #[derive(Debug, Clone)]
    pub struct State {
        pub calls: Vec<&'static str>,
        pub param_count: u32,
        pub image_status: ImageOpenStatus,
        pub assembly_status: ImageOpenStatus,
        pub find_method: bool,
        pub throw: bool,
        /// `(bytes, data_len, need_copy, name)` per image open
        pub opened: Vec<(Vec<u8>, u32, i32, String)>,
        /// Returned by the image-open stub when the data starts with this prefix; `IMAGE` otherwise
        pub reject_prefix: Option<Vec<u8>>,
        pub assembly_names: Vec<String>,
        pub method_desc: Option<(String, i32)>,
        pub invoke_args: Option<Option<Vec<usize>>>,
        pub array_new: Vec<(usize, usize, usize)>,
        pub domain_config: Option<(String, String)>,
        pub assemblies_path: Option<String>,
        pub dirs: Option<(String, String)>,
        pub config_parse_null: Option<bool>,
        pub domain_names: Vec<String>,
        pub main_thread: Option<usize>,
        pub to_string_exc_null: Option<bool>,
        pub freed: usize,
    }

    impl Default for State {
        fn default() -> Self {
            State {
                calls: Vec::new(),
                param_count: 0,
                image_status: MONO_IMAGE_OK,
                assembly_status: MONO_IMAGE_OK,
                find_method: true,
                throw: false,
                opened: Vec::new(),
                reject_prefix: None,
                assembly_names: Vec::new(),
                method_desc: None,
                invoke_args: None,
                array_new: Vec::new(),
                domain_config: None,
                assemblies_path: None,
                dirs: None,
                config_parse_null: None,
                domain_names: Vec::new(),
                main_thread: None,
                to_string_exc_null: None,
                freed: 0,
            }
        }
    }

    thread_local! {
        static STATE: RefCell<State> = RefCell::new(State::default());
    }

    pub fn reset(state: State) {
        STATE.with(|s| *s.borrow_mut() = state);
    }

    pub fn state() -> State {
        STATE.with(|s| s.borrow().clone())
    }

    pub fn count(call: &str) -> usize {
        STATE.with(|s| s.borrow().calls.iter().filter(|c| **c == call).count())
    }

    fn with<R>(f: impl FnOnce(&mut State) -> R) -> R {
        STATE.with(|s| f(&mut s.borrow_mut()))
    }

    unsafe fn text(ptr: *const c_char) -> String {
        if ptr.is_null() {
            String::new()
        } else {
            CStr::from_ptr(ptr).to_string_lossy().into_owned()
        }
    }

    unsafe extern "system" fn jit_init_version(name: *const c_char, _version: *const c_char) -> *mut c_void {
        let name = text(name);
        with(|s| {
            s.calls.push("jit_init_version");
            s.domain_names.push(name);
        });
        DOMAIN
    }

    unsafe extern "system" fn thread_current() -> *mut c_void {
        with(|s| s.calls.push("thread_current"));
        THREAD
    }

    unsafe extern "system" fn thread_set_main(thread: *mut c_void) {
        with(|s| {
            s.calls.push("thread_set_main");
            s.main_thread = Some(thread as usize);
        });
    }

    unsafe extern "system" fn set_assemblies_path(path: *const c_char) {
        let path = text(path);
        with(|s| {
            s.calls.push("set_assemblies_path");
            s.assemblies_path = Some(path);
        });
    }

    unsafe extern "system" fn assembly_getrootdir() -> *const c_char {
        with(|s| s.calls.push("assembly_getrootdir"));
        ROOT_DIR.as_ptr()
    }

    pub unsafe extern "system" fn image_open_from_data_with_name(
        data: *mut c_char,
        data_len: u32,
        need_copy: i32,
        status: *mut ImageOpenStatus,
        _refonly: i32,
        name: *const c_char,
    ) -> *mut c_void {
        let bytes = if data.is_null() {
            Vec::new()
        } else {
            std::slice::from_raw_parts(data as *const u8, data_len as usize).to_vec()
        };
        let name = text(name);
        with(|s| {
            s.calls.push("image_open_from_data_with_name");
            let rejected = s
                .reject_prefix
                .as_ref()
                .map_or(false, |prefix| bytes.starts_with(prefix));
            let code = if rejected { MONO_IMAGE_IMAGE_INVALID } else { s.image_status };
            if !status.is_null() {
                *status = code;
            }
            s.opened.push((bytes, data_len, need_copy, name));
            if code == MONO_IMAGE_OK {
                IMAGE
            } else {
                std::ptr::null_mut()
            }
        })
    }

    unsafe extern "system" fn assembly_load_from_full(
        _image: *mut c_void,
        fname: *const c_char,
        status: *mut ImageOpenStatus,
        _refonly: i32,
    ) -> *mut c_void {
        let fname = text(fname);
        with(|s| {
            s.calls.push("assembly_load_from_full");
            s.assembly_names.push(fname);
            *status = s.assembly_status;
        });
        ASSEMBLY
    }

    unsafe extern "system" fn method_desc_new(name: *const c_char, include_namespace: i32) -> *mut c_void {
        let name = text(name);
        with(|s| {
            s.calls.push("method_desc_new");
            s.method_desc = Some((name, include_namespace));
        });
        DESC
    }

    unsafe extern "system" fn method_desc_search_in_image(_desc: *mut c_void, _image: *mut c_void) -> *mut c_void {
        with(|s| {
            s.calls.push("method_desc_search_in_image");
            if s.find_method {
                METHOD
            } else {
                std::ptr::null_mut()
            }
        })
    }

    unsafe extern "system" fn method_desc_free(_desc: *mut c_void) {
        with(|s| s.calls.push("method_desc_free"));
    }

    unsafe extern "system" fn method_signature(_method: *mut c_void) -> *mut c_void {
        with(|s| s.calls.push("method_signature"));
        SIGNATURE
    }

    unsafe extern "system" fn signature_get_param_count(_signature: *mut c_void) -> u32 {
        with(|s| {
            s.calls.push("signature_get_param_count");
            s.param_count
        })
    }

    unsafe extern "system" fn array_new(domain: *mut c_void, class: *mut c_void, n: usize) -> *mut c_void {
        with(|s| {
            s.calls.push("array_new");
            s.array_new.push((domain as usize, class as usize, n));
        });
        ARRAY
    }

    unsafe extern "system" fn get_string_class() -> *mut c_void {
        with(|s| s.calls.push("get_string_class"));
        STRING_CLASS
    }

    unsafe extern "system" fn runtime_invoke(
        _method: *mut c_void,
        _obj: *mut c_void,
        params: *mut *mut c_void,
        exc: *mut *mut c_void,
    ) -> *mut c_void {
        with(|s| {
            s.calls.push("runtime_invoke");
            let args = if params.is_null() {
                None
            } else {
                let n = s.param_count.max(1) as usize;
                Some((0..n).map(|i| *params.add(i) as usize).collect())
            };
            s.invoke_args = Some(args);
            if s.throw {
                *exc = EXCEPTION;
            }
        });
        std::ptr::null_mut()
    }

    unsafe extern "system" fn string_to_utf8(string: *mut c_void) -> *mut c_char {
        with(|s| s.calls.push("string_to_utf8"));
        if string == EXCEPTION_STRING {
            EXCEPTION_TEXT.as_ptr() as *mut c_char
        } else {
            std::ptr::null_mut()
        }
    }

    unsafe extern "system" fn set_dirs(assembly_dir: *const c_char, config_dir: *const c_char) {
        let dirs = (text(assembly_dir), text(config_dir));
        with(|s| {
            s.calls.push("set_dirs");
            s.dirs = Some(dirs);
        });
    }

    unsafe extern "system" fn config_parse(filename: *const c_char) {
        with(|s| {
            s.calls.push("config_parse");
            s.config_parse_null = Some(filename.is_null());
        });
    }

    unsafe extern "system" fn domain_set_config(_domain: *mut c_void, base_dir: *const c_char, config_file: *const c_char) {
        let config = (text(base_dir), text(config_file));
        with(|s| {
            s.calls.push("domain_set_config");
            s.domain_config = Some(config);
        });
    }

    unsafe extern "system" fn object_to_string(obj: *mut c_void, exc: *mut *mut c_void) -> *mut c_void {
        with(|s| {
            s.calls.push("object_to_string");
            s.to_string_exc_null = Some(exc.is_null());
        });
        if obj == EXCEPTION {
            EXCEPTION_STRING
        } else {
            std::ptr::null_mut()
        }
    }

    unsafe extern "system" fn free(_ptr: *mut c_void) {
        with(|s| {
            s.calls.push("free");
            s.freed += 1;
        });
    }

    /// Every Mono symbol the bootstrap knows about, optional ones included
    pub fn symbols() -> MapSymbols {
        MapSymbols::new()
            .with("mono_jit_init_version", jit_init_version as *mut c_void)
            .with("mono_thread_current", thread_current as *mut c_void)
            .with("mono_thread_set_main", thread_set_main as *mut c_void)
            .with("mono_set_assemblies_path", set_assemblies_path as *mut c_void)
            .with("mono_assembly_getrootdir", assembly_getrootdir as *mut c_void)
            .with("mono_image_open_from_data_with_name", image_open_from_data_with_name as *mut c_void)
            .with("mono_assembly_load_from_full", assembly_load_from_full as *mut c_void)
            .with("mono_method_desc_new", method_desc_new as *mut c_void)
            .with("mono_method_desc_search_in_image", method_desc_search_in_image as *mut c_void)
            .with("mono_method_desc_free", method_desc_free as *mut c_void)
            .with("mono_method_signature", method_signature as *mut c_void)
            .with("mono_signature_get_param_count", signature_get_param_count as *mut c_void)
            .with("mono_array_new", array_new as *mut c_void)
            .with("mono_get_string_class", get_string_class as *mut c_void)
            .with("mono_runtime_invoke", runtime_invoke as *mut c_void)
            .with("mono_string_to_utf8", string_to_utf8 as *mut c_void)
            .with("mono_set_dirs", set_dirs as *mut c_void)
            .with("mono_config_parse", config_parse as *mut c_void)
            .with("mono_domain_set_config", domain_set_config as *mut c_void)
            .with("mono_object_to_string", object_to_string as *mut c_void)
            .with("mono_free", free as *mut c_void)
    }

    /// A fully bound table
    pub fn api() -> MonoApi {
        MonoApi::load(&symbols())
    }

    /// A table without the optional slots
    pub fn minimal_api() -> MonoApi {
        MonoApi {
            domain_set_config: None,
            object_to_string: None,
            free: None,
            ..api()
        }
    }
}

/// Stub IL2CPP runtime
#[cfg(feature = "il2cpp")]
pub mod fake_il2cpp {
    use super::*;
    use crate::il2cpp::api::Il2CppApi;
    use std::cell::Cell;
    use std::ffi::c_char;

    pub const INIT_RESULT: i32 = 0x5EED;

    thread_local! {
        static INIT_CALLS: Cell<usize> = const { Cell::new(0) };
    }

    pub fn init_calls() -> usize {
        INIT_CALLS.with(Cell::get)
    }

    unsafe extern "C" fn init(_domain_name: *const c_char) -> i32 {
        INIT_CALLS.with(|c| c.set(c.get() + 1));
        INIT_RESULT
    }

    pub fn api() -> Il2CppApi {
        INIT_CALLS.with(|c| c.set(0));
        Il2CppApi::load(&MapSymbols::new().with("il2cpp_init", init as *mut c_void))
    }
}

/// Stub CoreCLR runtime
#[cfg(feature = "coreclr")]
pub mod fake_coreclr {
    use super::*;
    use crate::coreclr::api::CoreClrApi;
    use std::ffi::{c_char, CStr};

    pub const HOST: *mut c_void = 0xC0 as *mut c_void;
    pub const DOMAIN_ID: u32 = 1;

    #[derive(Debug, Clone, Default)]
    pub struct State {
        pub calls: Vec<&'static str>,
        pub initialize_rc: i32,
        pub create_delegate_rc: i32,
        pub entry_rc: i32,
        pub properties: Vec<(String, String)>,
        pub delegate: Option<(String, String, String)>,
        pub friendly_name: Option<String>,
    }

    thread_local! {
        static STATE: RefCell<State> = RefCell::new(State::default());
    }

    pub fn reset(state: State) {
        STATE.with(|s| *s.borrow_mut() = state);
    }

    pub fn state() -> State {
        STATE.with(|s| s.borrow().clone())
    }

    unsafe fn text(ptr: *const c_char) -> String {
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }

    unsafe extern "system" fn entry() -> i32 {
        STATE.with(|s| {
            let mut s = s.borrow_mut();
            s.calls.push("entry");
            s.entry_rc
        })
    }

    unsafe extern "system" fn initialize(
        _exe_path: *const c_char,
        friendly_name: *const c_char,
        property_count: i32,
        keys: *const *const c_char,
        values: *const *const c_char,
        host_handle: *mut *mut c_void,
        domain_id: *mut u32,
    ) -> i32 {
        let properties = (0..property_count as usize)
            .map(|i| (text(*keys.add(i)), text(*values.add(i))))
            .collect();
        let friendly_name = text(friendly_name);
        STATE.with(|s| {
            let mut s = s.borrow_mut();
            s.calls.push("initialize");
            s.properties = properties;
            s.friendly_name = Some(friendly_name);
            if s.initialize_rc == 0 {
                *host_handle = HOST;
                *domain_id = DOMAIN_ID;
            }
            s.initialize_rc
        })
    }

    unsafe extern "system" fn create_delegate(
        _host_handle: *mut c_void,
        _domain_id: u32,
        assembly: *const c_char,
        type_name: *const c_char,
        method: *const c_char,
        delegate: *mut *mut c_void,
    ) -> i32 {
        let names = (text(assembly), text(type_name), text(method));
        STATE.with(|s| {
            let mut s = s.borrow_mut();
            s.calls.push("create_delegate");
            s.delegate = Some(names);
            if s.create_delegate_rc == 0 {
                *delegate = entry as *mut c_void;
            }
            s.create_delegate_rc
        })
    }

    pub fn symbols() -> MapSymbols {
        MapSymbols::new()
            .with("coreclr_initialize", initialize as *mut c_void)
            .with("coreclr_create_delegate", create_delegate as *mut c_void)
    }

    pub fn api() -> CoreClrApi {
        CoreClrApi::load(&symbols())
    }
}
