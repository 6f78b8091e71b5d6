//! Body of the `il2cpp_init` hook
//!
//! IL2CPP has no embedding surface for loading assemblies, so a second
//! runtime is started next to it: Mono by default, or CoreCLR when both
//! CoreCLR paths are configured. The host only ever sees the result of the
//! real `il2cpp_init`.

use std::ffi::{c_char, CStr};
use std::path::PathBuf;
use std::ptr;
use std::sync::OnceLock;

use log::{info, warn};

use super::api::Il2CppApi;
use crate::backend::{EnvStore, LibraryLoader, ManagedHandle, RuntimeFlavor};
use crate::common::guard;
use crate::common::paths::{self, HostPath};
use crate::config::{Config, ConfigSlot};
use crate::coreclr::{self, CoreClrApi};
use crate::error::{required, BootstrapError, Result};
use crate::mono::{self, MonoApi};
use crate::outcome::{conclude, shielded, Outcome};

/// Name of the Mono domain created for the target assembly
pub const SIBLING_DOMAIN_NAME: &CStr = c"Doorstop Root Domain";

/// Where a sibling runtime comes from and where its bindings are published
pub struct SiblingRuntimes<'a, L: LibraryLoader> {
    pub loader: &'a L,
    pub mono: &'a OnceLock<MonoApi>,
    pub coreclr: &'a OnceLock<CoreClrApi>,
}

/// Run the real `il2cpp_init`, then bootstrap through a sibling runtime
///
/// # Safety
/// `domain_name` follows the `il2cpp_init` contract.
pub unsafe fn init_il2cpp<L: LibraryLoader>(
    api: &Il2CppApi,
    siblings: &SiblingRuntimes<'_, L>,
    config: &ConfigSlot,
    env: &impl EnvStore,
    domain_name: *const c_char,
) -> i32 {
    if !domain_name.is_null() {
        info!("Starting IL2CPP domain \"{}\"", CStr::from_ptr(domain_name).to_string_lossy());
    }

    let Some(init) = api.init else {
        warn!("il2cpp_init is not bound, nothing to start");
        config.take();
        return 0;
    };
    let result = init(domain_name);

    shielded("IL2CPP bootstrap", || start_sibling(siblings, config, env));
    // Whatever happened above, the config does not outlive this call
    config.take();
    result
}

fn start_sibling<L: LibraryLoader>(
    siblings: &SiblingRuntimes<'_, L>,
    config: &ConfigSlot,
    env: &impl EnvStore,
) -> Option<Outcome> {
    let result = if guard::is_initialized(env) {
        config.take();
        Ok(Outcome::Skipped)
    } else if config.peek(Config::wants_coreclr).unwrap_or(false) {
        start_coreclr(siblings, config, env)
    } else {
        start_mono(siblings, config, env)
    };
    conclude(RuntimeFlavor::Il2Cpp, result)
}

/// Absolute form of a configured path that must exist
fn existing(path: Option<PathBuf>, is_file: bool) -> Result<PathBuf> {
    let path = path.map(|p| paths::full_path(&p)).unwrap_or_default();
    let found = if is_file {
        paths::file_exists(&path)
    } else {
        paths::folder_exists(&path)
    };
    if found {
        Ok(path)
    } else {
        Err(BootstrapError::RuntimeNotFound(path))
    }
}

fn start_mono<L: LibraryLoader>(
    siblings: &SiblingRuntimes<'_, L>,
    config: &ConfigSlot,
    env: &impl EnvStore,
) -> Result<Outcome> {
    let (lib, corlib_dir, config_dir) = config
        .peek(|c| (c.mono_lib_dir.clone(), c.mono_corlib_dir.clone(), c.mono_config_dir.clone()))
        .ok_or(BootstrapError::MissingConfig)?;

    let lib = existing(lib, true)?;
    let corlib_dir = existing(corlib_dir, false)?;
    let config_dir = existing(config_dir, false)?;
    info!("Mono lib: {}", lib.display());
    info!("Mono corlib dir: {}", corlib_dir.display());
    info!("Mono config dir: {}", config_dir.display());

    // The runtime stays mapped for the rest of the process
    let library: &'static L::Library = Box::leak(Box::new(siblings.loader.open_lazy(&lib)?));
    let api = siblings.mono.get_or_init(|| MonoApi::load(library));

    let set_dirs = required(api.set_dirs, "mono_set_dirs")?;
    let config_parse = required(api.config_parse, "mono_config_parse")?;
    let jit_init_version = required(api.jit_init_version, "mono_jit_init_version")?;

    let corlib_dir = HostPath::new(corlib_dir)?;
    let config_dir = HostPath::new(config_dir)?;
    let domain = unsafe {
        set_dirs(corlib_dir.as_ptr(), config_dir.as_ptr());
        config_parse(ptr::null());
        jit_init_version(SIBLING_DOMAIN_NAME.as_ptr(), ptr::null())
    };
    if domain.is_null() {
        return Err(BootstrapError::NoDomain("mono_jit_init_version"));
    }
    info!("Created domain: {:p}", domain);

    mono::bootstrap::run(api, ManagedHandle::mono(domain), config, env)
}

fn start_coreclr<L: LibraryLoader>(
    siblings: &SiblingRuntimes<'_, L>,
    config: &ConfigSlot,
    env: &impl EnvStore,
) -> Result<Outcome> {
    let snapshot = config.peek(Config::clone).ok_or(BootstrapError::MissingConfig)?;

    let runtime = existing(snapshot.clr_runtime_coreclr_path.clone(), true)?;
    existing(snapshot.clr_corlib_dir.clone(), false)?;
    info!("CoreCLR runtime: {}", runtime.display());

    let library: &'static L::Library = Box::leak(Box::new(siblings.loader.open_lazy(&runtime)?));
    let api = siblings.coreclr.get_or_init(|| CoreClrApi::load(library));

    let (host, domain_id) = coreclr::bootstrap::initialize_sibling(api, &snapshot)?;
    drop(snapshot);

    coreclr::bootstrap::run(api, host, domain_id, config, env)
}
