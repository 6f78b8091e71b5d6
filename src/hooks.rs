//! Hook state and the exported hook entry points
//!
//! The injector installs a [`Config`] with [`install_config`], then routes
//! every runtime symbol lookup of the host through [`try_hook`]. When the
//! host asks for a runtime's initialization function it gets one of the
//! `extern` functions below instead. Looking a symbol up only binds its
//! table; the runtime that owns the process is whichever initialization hook
//! actually fires first. The others forward to the real function untouched.
//!
//! Nothing here unwinds into the host: each entry point runs its body under
//! [`shielded`] and hands back what the real function returned.

use std::ffi::{c_char, c_void};
use std::ptr::{self, NonNull};
use std::sync::OnceLock;

use log::{debug, info, trace, warn};

use crate::backend::{
    cast_symbol, BorrowedModule, EnvStore, FlavorLatch, LibraryLoader, RuntimeFlavor, SymbolSource, SystemLoader,
};
use crate::common::ProcessEnv;
use crate::config::{Config, ConfigSlot};
use crate::outcome::shielded;

#[cfg(feature = "coreclr")]
use crate::coreclr::{self, CoreClrApi};
#[cfg(feature = "il2cpp")]
use crate::il2cpp::{self, Il2CppApi, SiblingRuntimes};
#[cfg(feature = "mono")]
use crate::common::paths;
#[cfg(feature = "mono")]
use crate::mono::{self, api::ImageOpenStatus, ImageResolver, MonoApi};
#[cfg(feature = "mono")]
use crate::outcome::shielded_or;

/// Everything the hooks share: config, detected flavor and bound tables
pub struct Hooks<L: LibraryLoader, E: EnvStore> {
    config: ConfigSlot,
    flavor: FlavorLatch,
    loader: L,
    env: E,
    /// Tables bound from the host's own modules
    #[cfg(feature = "mono")]
    mono: OnceLock<MonoApi>,
    #[cfg(feature = "mono")]
    resolver: OnceLock<ImageResolver>,
    #[cfg(feature = "il2cpp")]
    il2cpp: OnceLock<Il2CppApi>,
    #[cfg(feature = "coreclr")]
    coreclr: OnceLock<CoreClrApi>,
    /// Tables of the runtime started next to an IL2CPP host
    #[cfg(feature = "il2cpp")]
    sibling_mono: OnceLock<MonoApi>,
    #[cfg(feature = "il2cpp")]
    sibling_coreclr: OnceLock<CoreClrApi>,
}

static HOOKS: Hooks<SystemLoader, ProcessEnv> = Hooks::new(SystemLoader, ProcessEnv);

impl<L: LibraryLoader, E: EnvStore> Hooks<L, E> {
    pub const fn new(loader: L, env: E) -> Self {
        Hooks {
            config: ConfigSlot::new(),
            flavor: FlavorLatch::new(),
            loader,
            env,
            #[cfg(feature = "mono")]
            mono: OnceLock::new(),
            #[cfg(feature = "mono")]
            resolver: OnceLock::new(),
            #[cfg(feature = "il2cpp")]
            il2cpp: OnceLock::new(),
            #[cfg(feature = "coreclr")]
            coreclr: OnceLock::new(),
            #[cfg(feature = "il2cpp")]
            sibling_mono: OnceLock::new(),
            #[cfg(feature = "il2cpp")]
            sibling_coreclr: OnceLock::new(),
        }
    }

    /// Store the config unless it or `DOORSTOP_DISABLE` turns the bootstrap off
    pub fn install_config(&self, config: Config) -> bool {
        if !config.should_bootstrap(&self.env) {
            info!("Doorstop is disabled, not installing hooks");
            return false;
        }
        debug!("Installing config: {:?}", config);
        if self.config.install(config).is_some() {
            warn!("Replaced a previously installed config");
        }
        true
    }

    pub fn detected_flavor(&self) -> Option<RuntimeFlavor> {
        self.flavor.get()
    }

    /// No other runtime has taken the process yet
    fn open_to(&self, flavor: RuntimeFlavor) -> bool {
        self.flavor.get().map_or(true, |owner| owner == flavor)
    }

    /// Take the process for `flavor`; logs when another runtime already has it
    fn claim(&self, flavor: RuntimeFlavor, call: &str) -> bool {
        if self.flavor.claim(flavor) {
            return true;
        }
        if let Some(owner) = self.flavor.get() {
            info!("{} already started, forwarding {}", owner, call);
        }
        false
    }

    /// Replacement address for `name`, binding its table from `module`
    ///
    /// # Safety
    /// `address` must be null or the real export `name` resolves to in `module`.
    pub unsafe fn try_hook(&self, module: &dyn SymbolSource, name: &str, address: *const c_void) -> Option<*const c_void> {
        let original = NonNull::new(address as *mut c_void)?;

        let replacement = match name {
            #[cfg(feature = "mono")]
            "mono_jit_init_version" if self.open_to(RuntimeFlavor::Mono) => {
                self.mono.get_or_init(|| {
                    let mut api = MonoApi::load(module);
                    api.jit_init_version = Some(cast_symbol(original));
                    api
                });
                init_mono as *const c_void
            }
            #[cfg(feature = "mono")]
            "mono_image_open_from_data_with_name" if self.open_to(RuntimeFlavor::Mono) => {
                let override_dir = self.config.peek(|c| c.mono_dll_search_path_override.clone()).flatten()?;
                self.resolver.get_or_init(|| {
                    ImageResolver::new(Some(paths::full_path(&override_dir)), Some(cast_symbol(original)))
                });
                hook_mono_image_open_from_data_with_name as *const c_void
            }
            #[cfg(feature = "il2cpp")]
            "il2cpp_init" if self.open_to(RuntimeFlavor::Il2Cpp) => {
                self.il2cpp.get_or_init(|| {
                    let mut api = Il2CppApi::load(module);
                    api.init = Some(cast_symbol(original));
                    api
                });
                init_il2cpp as *const c_void
            }
            #[cfg(feature = "coreclr")]
            "coreclr_initialize" if self.open_to(RuntimeFlavor::CoreClr) => {
                self.coreclr.get_or_init(|| {
                    let mut api = CoreClrApi::load(module);
                    api.initialize = Some(cast_symbol(original));
                    api
                });
                hook_coreclr_initialize as *const c_void
            }
            _ => return None,
        };

        trace!("Hooking {}", name);
        Some(replacement)
    }

    /// # Safety
    /// Arguments follow the `mono_jit_init_version` contract.
    #[cfg(feature = "mono")]
    pub unsafe fn init_mono(&self, root_domain_name: *const c_char, runtime_version: *const c_char) -> *mut c_void {
        let Some(api) = self.mono.get() else {
            return ptr::null_mut();
        };
        if !self.claim(RuntimeFlavor::Mono, "mono_jit_init_version") {
            return api
                .jit_init_version
                .map_or(ptr::null_mut(), |init| init(root_domain_name, runtime_version));
        }
        shielded("init_mono", || {
            mono::init_mono(api, &self.config, &self.env, root_domain_name, runtime_version)
        })
        .unwrap_or(ptr::null_mut())
    }

    /// # Safety
    /// `domain_name` follows the `il2cpp_init` contract.
    #[cfg(feature = "il2cpp")]
    pub unsafe fn init_il2cpp(&self, domain_name: *const c_char) -> i32 {
        let Some(api) = self.il2cpp.get() else {
            return 0;
        };
        if !self.claim(RuntimeFlavor::Il2Cpp, "il2cpp_init") {
            return api.init.map_or(0, |init| init(domain_name));
        }
        let siblings = SiblingRuntimes {
            loader: &self.loader,
            mono: &self.sibling_mono,
            coreclr: &self.sibling_coreclr,
        };
        shielded("init_il2cpp", || {
            il2cpp::init_il2cpp(api, &siblings, &self.config, &self.env, domain_name)
        })
        .unwrap_or(0)
    }

    /// Open an image through the resolver; the real function once another runtime owns the process
    ///
    /// # Safety
    /// Arguments follow the `mono_image_open_from_data_with_name` contract.
    #[cfg(feature = "mono")]
    pub unsafe fn open_image(
        &self,
        data: *mut c_char,
        data_len: u32,
        need_copy: i32,
        status: *mut ImageOpenStatus,
        refonly: i32,
        name: *const c_char,
    ) -> *mut c_void {
        let Some(resolver) = self.resolver.get() else {
            return ptr::null_mut();
        };
        let forward = || {
            resolver
                .original()
                .map_or(ptr::null_mut(), |open| open(data, data_len, need_copy, status, refonly, name))
        };

        if !self.open_to(RuntimeFlavor::Mono) {
            return forward();
        }
        shielded_or(
            "Assembly resolver",
            || resolver.open(data, data_len, need_copy, status, refonly, name),
            forward,
        )
    }

    /// # Safety
    /// Arguments follow the `coreclr_initialize` contract.
    #[cfg(feature = "coreclr")]
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn initialize_coreclr(
        &self,
        exe_path: *const c_char,
        app_domain_friendly_name: *const c_char,
        property_count: i32,
        property_keys: *const *const c_char,
        property_values: *const *const c_char,
        host_handle: *mut *mut c_void,
        domain_id: *mut u32,
    ) -> i32 {
        let Some(api) = self.coreclr.get() else {
            return -1;
        };
        if !self.claim(RuntimeFlavor::CoreClr, "coreclr_initialize") {
            return api.initialize.map_or(-1, |initialize| {
                initialize(
                    exe_path,
                    app_domain_friendly_name,
                    property_count,
                    property_keys,
                    property_values,
                    host_handle,
                    domain_id,
                )
            });
        }
        shielded("hook_coreclr_initialize", || {
            coreclr::initialize_hooked(
                api,
                &self.config,
                &self.env,
                exe_path,
                app_domain_friendly_name,
                property_count,
                property_keys,
                property_values,
                host_handle,
                domain_id,
            )
        })
        .unwrap_or(-1)
    }
}

/// Hand the bootstrap its configuration
///
/// Returns `false` (and installs nothing) when the config or the
/// `DOORSTOP_DISABLE` switch turns the bootstrap off.
pub fn install_config(config: Config) -> bool {
    HOOKS.install_config(config)
}

/// The runtime whose initialization hook fired first, if any
pub fn detected_flavor() -> Option<RuntimeFlavor> {
    HOOKS.detected_flavor()
}

/// Replacement address for a runtime symbol the host is resolving
///
/// `module` is the library the host looked `name` up in and `address` the
/// real symbol. Returns `None` when the symbol should be left alone.
///
/// # Safety
/// `module` must be a live module handle and `address` the real export
/// `name` resolves to in it (or null).
pub unsafe fn try_hook(module: *mut c_void, name: &str, address: *const c_void) -> Option<*const c_void> {
    HOOKS.try_hook(&BorrowedModule::from_raw(module), name, address)
}

/// Replacement for `mono_jit_init_version`
///
/// # Safety
/// Called by the host with the arguments of `mono_jit_init_version`.
#[cfg(feature = "mono")]
#[no_mangle]
pub unsafe extern "system" fn init_mono(root_domain_name: *const c_char, runtime_version: *const c_char) -> *mut c_void {
    HOOKS.init_mono(root_domain_name, runtime_version)
}

/// Replacement for `il2cpp_init`
///
/// # Safety
/// Called by the host with the argument of `il2cpp_init`.
#[cfg(feature = "il2cpp")]
#[no_mangle]
pub unsafe extern "C" fn init_il2cpp(domain_name: *const c_char) -> i32 {
    HOOKS.init_il2cpp(domain_name)
}

/// Replacement for `mono_image_open_from_data_with_name`
///
/// # Safety
/// Called by the runtime with the arguments of
/// `mono_image_open_from_data_with_name`.
#[cfg(feature = "mono")]
#[no_mangle]
pub unsafe extern "system" fn hook_mono_image_open_from_data_with_name(
    data: *mut c_char,
    data_len: u32,
    need_copy: i32,
    status: *mut ImageOpenStatus,
    refonly: i32,
    name: *const c_char,
) -> *mut c_void {
    HOOKS.open_image(data, data_len, need_copy, status, refonly, name)
}

/// Replacement for `coreclr_initialize`
///
/// # Safety
/// Called by the host with the arguments of `coreclr_initialize`.
#[cfg(feature = "coreclr")]
#[no_mangle]
pub unsafe extern "system" fn hook_coreclr_initialize(
    exe_path: *const c_char,
    app_domain_friendly_name: *const c_char,
    property_count: i32,
    property_keys: *const *const c_char,
    property_values: *const *const c_char,
    host_handle: *mut *mut c_void,
    domain_id: *mut u32,
) -> i32 {
    HOOKS.initialize_coreclr(
        exe_path,
        app_domain_friendly_name,
        property_count,
        property_keys,
        property_values,
        host_handle,
        domain_id,
    )
}
