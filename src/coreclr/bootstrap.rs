//! CoreCLR bootstrap
//!
//! The target assembly exposes `Doorstop.Entrypoint.Start`, a static method
//! with no parameters returning an `int` status. It is bound through
//! `coreclr_create_delegate` and called once.

use std::ffi::{c_char, c_void, CString, OsString};
use std::path::{Path, PathBuf};
use std::ptr::{self, NonNull};

use log::{debug, info, warn};

use super::api::{CoreClrApi, EntryPointFn};
use crate::backend::{cast_symbol, EnvStore, ManagedHandle, RuntimeFlavor};
use crate::common::env::{self, publish};
use crate::common::guard;
use crate::common::paths::{self, HostPath, SEARCH_PATH_SEPARATOR};
use crate::config::{Config, ConfigSlot};
use crate::error::{required, BootstrapError, Result};
use crate::outcome::{conclude, shielded, Outcome};

pub const ENTRY_TYPE: &str = "Doorstop.Entrypoint";
pub const ENTRY_METHOD: &str = "Start";
const ENTRY_POINT: &str = "Doorstop.Entrypoint.Start";

/// Friendly name of the domain created for an IL2CPP host
pub const SIBLING_DOMAIN_NAME: &str = "Doorstop Domain";

/// Run the bootstrap inside an initialized CoreCLR host, logging how it ended
pub fn bootstrap(
    api: &CoreClrApi,
    host: ManagedHandle,
    domain_id: u32,
    config: &ConfigSlot,
    env: &impl EnvStore,
) -> Option<Outcome> {
    conclude(RuntimeFlavor::CoreClr, run(api, host, domain_id, config, env))
}

/// Bind and call the managed entry point
pub fn run(
    api: &CoreClrApi,
    host: ManagedHandle,
    domain_id: u32,
    config: &ConfigSlot,
    env: &impl EnvStore,
) -> Result<Outcome> {
    let config = config.take();

    if !guard::try_acquire(env) {
        return Ok(Outcome::Skipped);
    }

    let config = config.ok_or(BootstrapError::MissingConfig)?;
    let target = config.target_assembly.as_deref().ok_or(BootstrapError::MissingTarget)?;
    let create_delegate = required(api.create_delegate, "coreclr_create_delegate")?;

    if let Some(corlib_dir) = config.clr_corlib_dir.as_deref() {
        publish(env, env::MANAGED_FOLDER_DIR, paths::full_path(corlib_dir));
    }
    if let Some(program) = paths::program_path() {
        publish(env, env::PROCESS_PATH, program);
    }
    publish(env, env::INVOKE_DLL_PATH, target);

    let assembly = assembly_name(target)?;
    let type_name = CString::new(ENTRY_TYPE).map_err(|_| BootstrapError::InteriorNul(ENTRY_TYPE.to_string()))?;
    let method_name = CString::new(ENTRY_METHOD).map_err(|_| BootstrapError::InteriorNul(ENTRY_METHOD.to_string()))?;

    info!("Binding {} from {}", ENTRY_POINT, assembly.to_string_lossy());
    let mut delegate: *mut c_void = ptr::null_mut();
    let code = unsafe {
        create_delegate(
            host.as_raw(RuntimeFlavor::CoreClr),
            domain_id,
            assembly.as_ptr(),
            type_name.as_ptr(),
            method_name.as_ptr(),
            &mut delegate,
        )
    };
    if code != 0 {
        return Err(BootstrapError::ClrStatus {
            call: "coreclr_create_delegate",
            code,
        });
    }

    let delegate = NonNull::new(delegate).ok_or(BootstrapError::EntryPointMissing(ENTRY_POINT))?;
    let entry: EntryPointFn = unsafe { cast_symbol(delegate) };

    info!("Invoking {}", ENTRY_POINT);
    match unsafe { entry() } {
        0 => Ok(Outcome::Invoked),
        code => Ok(Outcome::ExitCode(code)),
    }
}

/// Simple assembly name CoreCLR binds the target by
fn assembly_name(target: &Path) -> Result<CString> {
    let stem = target
        .file_stem()
        .ok_or_else(|| BootstrapError::Config(format!("{} has no file name", target.display())))?;
    paths::narrow(stem)
}

/// Call the real `coreclr_initialize` and bootstrap into the host it creates
///
/// The host always receives the real return code.
///
/// # Safety
/// Arguments follow the `coreclr_initialize` contract.
#[allow(clippy::too_many_arguments)]
pub unsafe fn initialize_hooked(
    api: &CoreClrApi,
    config: &ConfigSlot,
    env: &impl EnvStore,
    exe_path: *const c_char,
    app_domain_friendly_name: *const c_char,
    property_count: i32,
    property_keys: *const *const c_char,
    property_values: *const *const c_char,
    host_handle: *mut *mut c_void,
    domain_id: *mut u32,
) -> i32 {
    let Some(initialize) = api.initialize else {
        warn!("coreclr_initialize is not bound, nothing to start");
        config.take();
        return -1;
    };

    let code = initialize(
        exe_path,
        app_domain_friendly_name,
        property_count,
        property_keys,
        property_values,
        host_handle,
        domain_id,
    );

    if code != 0 || host_handle.is_null() || domain_id.is_null() {
        warn!("coreclr_initialize failed with {:#010x}, not bootstrapping", code);
        config.take();
        return code;
    }

    let host = ManagedHandle::new(*host_handle, RuntimeFlavor::CoreClr);
    let domain = *domain_id;
    shielded("CoreCLR bootstrap", || bootstrap(api, host, domain, config, env));
    code
}

/// Runtime properties for a freshly created host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostProperties {
    pub trusted_platform_assemblies: OsString,
    pub app_paths: OsString,
}

impl HostProperties {
    /// Every `.dll` in `corlib_dir` plus `target`, and the target's directory as the app path
    pub fn collect(corlib_dir: &Path, target: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(corlib_dir).map_err(|source| BootstrapError::Io {
            path: corlib_dir.to_path_buf(),
            source,
        })?;

        let mut assemblies: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("dll"))
            })
            .collect();
        assemblies.sort();
        assemblies.push(paths::full_path(target));

        let mut trusted_platform_assemblies = OsString::new();
        for (i, assembly) in assemblies.iter().enumerate() {
            if i > 0 {
                trusted_platform_assemblies.push(SEARCH_PATH_SEPARATOR);
            }
            trusted_platform_assemblies.push(assembly);
        }

        Ok(HostProperties {
            trusted_platform_assemblies,
            app_paths: paths::folder_name(&paths::full_path(target)).into_os_string(),
        })
    }
}

/// Create a CoreCLR host next to a non-CoreCLR runtime
///
/// Returns the host handle and domain id on success.
pub fn initialize_sibling(api: &CoreClrApi, config: &Config) -> Result<(ManagedHandle, u32)> {
    let initialize = required(api.initialize, "coreclr_initialize")?;
    let target = config.target_assembly.as_deref().ok_or(BootstrapError::MissingTarget)?;
    let corlib_dir = config
        .clr_corlib_dir
        .as_deref()
        .map(paths::full_path)
        .ok_or_else(|| BootstrapError::Config("clr_corlib_dir is not set".to_string()))?;

    let properties = HostProperties::collect(&corlib_dir, target)?;
    debug!("TRUSTED_PLATFORM_ASSEMBLIES = {}", properties.trusted_platform_assemblies.to_string_lossy());
    debug!("APP_PATHS = {}", properties.app_paths.to_string_lossy());

    let keys = [c"TRUSTED_PLATFORM_ASSEMBLIES", c"APP_PATHS"];
    let values = [
        paths::narrow(&properties.trusted_platform_assemblies)?,
        paths::narrow(&properties.app_paths)?,
    ];
    let key_ptrs: Vec<*const c_char> = keys.iter().map(|k| k.as_ptr()).collect();
    let value_ptrs: Vec<*const c_char> = values.iter().map(|v| v.as_ptr()).collect();

    let exe_path = HostPath::new(paths::program_path().unwrap_or_else(|| target.to_path_buf()))?;
    let friendly_name = CString::new(SIBLING_DOMAIN_NAME)
        .map_err(|_| BootstrapError::InteriorNul(SIBLING_DOMAIN_NAME.to_string()))?;

    let mut host_handle: *mut c_void = ptr::null_mut();
    let mut domain_id: u32 = 0;
    info!("Starting CoreCLR from {}", corlib_dir.display());
    let code = unsafe {
        initialize(
            exe_path.as_ptr(),
            friendly_name.as_ptr(),
            key_ptrs.len() as i32,
            key_ptrs.as_ptr(),
            value_ptrs.as_ptr(),
            &mut host_handle,
            &mut domain_id,
        )
    };
    if code != 0 {
        return Err(BootstrapError::ClrStatus {
            call: "coreclr_initialize",
            code,
        });
    }

    Ok((ManagedHandle::new(host_handle, RuntimeFlavor::CoreClr), domain_id))
}
