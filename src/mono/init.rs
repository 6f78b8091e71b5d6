//! Body of the `mono_jit_init_version` hook

use std::ffi::{c_char, c_void, OsString};
use std::ptr;

use log::{debug, info, warn};

use super::api::MonoApi;
use super::bootstrap;
use crate::backend::{EnvStore, ManagedHandle};
use crate::common::env::{self, join_search_dirs, publish};
use crate::common::guard;
use crate::common::paths::{self, HostPath, SEARCH_PATH_SEPARATOR};
use crate::config::ConfigSlot;
use crate::error::{required, Result};
use crate::outcome::shielded;

/// Initialize the host's Mono domain, then bootstrap into it
///
/// Returns whatever the real `jit_init_version` returned, or null when it is
/// not bound.
///
/// # Safety
/// `name` and `version` follow the `mono_jit_init_version` contract.
pub unsafe fn init_mono(
    api: &MonoApi,
    config: &ConfigSlot,
    env: &impl EnvStore,
    name: *const c_char,
    version: *const c_char,
) -> *mut c_void {
    info!("Starting mono domain");

    let Some(jit_init_version) = api.jit_init_version else {
        warn!("mono_jit_init_version is not bound, nothing to start");
        config.take();
        return ptr::null_mut();
    };

    if !guard::is_initialized(env) {
        shielded("Search path setup", || {
            if let Err(e) = publish_search_path(api, config, env) {
                warn!("Could not set up the assembly search path: {}", e);
            }
        });
    }

    let domain = jit_init_version(name, version);
    if domain.is_null() {
        warn!("mono_jit_init_version returned no domain");
        config.take();
        return domain;
    }

    shielded("Mono bootstrap", || {
        bootstrap::bootstrap(api, ManagedHandle::mono(domain), config, env)
    });
    domain
}

/// Put the override directory in front of Mono's assembly search path
fn publish_search_path(api: &MonoApi, config: &ConfigSlot, env: &impl EnvStore) -> Result<()> {
    let assembly_getrootdir = required(api.assembly_getrootdir, "mono_assembly_getrootdir")?;
    let root = unsafe { paths::widen(assembly_getrootdir()) }.unwrap_or_default();
    debug!("Mono root dir: {}", root.to_string_lossy());

    let override_dir = config
        .peek(|c| c.mono_dll_search_path_override.clone())
        .flatten()
        .map(|dir| paths::full_path(&dir));

    let Some(override_dir) = override_dir else {
        publish(env, env::DLL_SEARCH_DIRS, &root);
        return Ok(());
    };

    publish(env, env::DLL_SEARCH_DIRS, join_search_dirs([override_dir.as_os_str(), root.as_os_str()]));

    let Some(set_assemblies_path) = api.set_assemblies_path else {
        warn!("mono_set_assemblies_path is not available, search path left as is");
        return Ok(());
    };

    let mut search_path = OsString::from(override_dir.as_os_str());
    search_path.push(SEARCH_PATH_SEPARATOR);
    search_path.push(&root);
    let search_path = HostPath::new(search_path)?;

    info!("Mono search path: {}", search_path.path().display());
    unsafe { set_assemblies_path(search_path.as_ptr()) };

    Ok(())
}
