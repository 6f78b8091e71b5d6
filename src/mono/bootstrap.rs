//! Load-and-invoke state machine for Mono domains
//!
//! Given a domain (the host's own, or the sibling one created for an
//! IL2CPP host), load the target assembly, find `*:Main` and run it once.
//!
//! Every step either advances or returns an error; resources owned at that
//! point (config, file bytes, narrow paths, method description, argument
//! vector) are released by scope on all exit paths.

use std::ffi::{c_void, OsString};
use std::io;
use std::ptr;

use log::{debug, info, warn};

use super::api::{MonoApi, MONO_IMAGE_OK};
use super::exception;
use crate::backend::{EnvStore, ManagedHandle, RuntimeFlavor};
use crate::common::env::{self, publish};
use crate::common::guard;
use crate::common::paths::{self, HostPath};
use crate::config::ConfigSlot;
use crate::error::{required, BootstrapError, Result};
use crate::outcome::{conclude, Outcome};

/// Method description searched in the target image
pub const ENTRY_POINT: &str = "*:Main";

/// Owned `MonoMethodDesc*`, freed on drop
struct MethodDesc {
    raw: *mut c_void,
    free: Option<unsafe extern "system" fn(*mut c_void)>,
}

impl Drop for MethodDesc {
    fn drop(&mut self) {
        if let Some(free) = self.free {
            if !self.raw.is_null() {
                unsafe { free(self.raw) };
            }
        }
    }
}

/// Run the bootstrap against `domain`, logging how it ended
pub fn bootstrap(api: &MonoApi, domain: ManagedHandle, config: &ConfigSlot, env: &impl EnvStore) -> Option<Outcome> {
    conclude(RuntimeFlavor::Mono, run(api, domain, config, env))
}

/// Run the bootstrap against `domain`
pub fn run(api: &MonoApi, domain: ManagedHandle, config: &ConfigSlot, env: &impl EnvStore) -> Result<Outcome> {
    // Released when this function returns, whichever way it does
    let config = config.take();

    if !guard::try_acquire(env) {
        return Ok(Outcome::Skipped);
    }

    let config = config.ok_or(BootstrapError::MissingConfig)?;
    let target = config.target_assembly.as_deref().ok_or(BootstrapError::MissingTarget)?;
    let domain = domain.as_raw(RuntimeFlavor::Mono);

    let thread_current = required(api.thread_current, "mono_thread_current")?;
    let thread_set_main = required(api.thread_set_main, "mono_thread_set_main")?;
    unsafe { thread_set_main(thread_current()) };

    let program = paths::program_path();

    match (api.domain_set_config, program.as_deref()) {
        (Some(domain_set_config), Some(program)) => {
            let mut config_file = OsString::from(program.as_os_str());
            config_file.push(".config");
            let config_file = HostPath::new(config_file)?;
            let base_dir = HostPath::new(paths::folder_name(program))?;

            info!(
                "Setting config paths: base dir: {}; config path: {}",
                base_dir.path().display(),
                config_file.path().display()
            );
            unsafe { domain_set_config(domain, base_dir.as_ptr(), config_file.as_ptr()) };
        }
        (Some(_), None) => warn!("Could not determine the program path, skipping domain config"),
        (None, _) => debug!("mono_domain_set_config is not available"),
    }

    let assembly_getrootdir = required(api.assembly_getrootdir, "mono_assembly_getrootdir")?;
    if let Some(root) = unsafe { paths::widen(assembly_getrootdir()) } {
        info!("Assembly dir: {}", root.to_string_lossy());
        publish(env, env::MANAGED_FOLDER_DIR, &root);
    }
    if let Some(program) = program.as_deref() {
        publish(env, env::PROCESS_PATH, program);
    }
    publish(env, env::INVOKE_DLL_PATH, target);

    let image_open = required(api.image_open_from_data_with_name, "mono_image_open_from_data_with_name")?;
    let assembly_load_from_full = required(api.assembly_load_from_full, "mono_assembly_load_from_full")?;

    // Kept alive until after the bind below
    let dll_path = HostPath::new(target)?;
    info!("Loading assembly: {}", target.display());

    let image = {
        let mut data = paths::read_file(target)?;
        let len = u32::try_from(data.len()).map_err(|_| BootstrapError::Io {
            path: target.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidData, "assembly is larger than 4 GiB"),
        })?;

        let mut status = MONO_IMAGE_OK;
        // need_copy: the runtime copies the bytes, so `data` can go right after
        let image = unsafe { image_open(data.as_mut_ptr().cast(), len, 1, &mut status, 0, dll_path.as_ptr()) };
        if status != MONO_IMAGE_OK || image.is_null() {
            return Err(BootstrapError::ImageOpen {
                path: target.to_path_buf(),
                status,
            });
        }
        image
    };

    let mut status = MONO_IMAGE_OK;
    let assembly = unsafe { assembly_load_from_full(image, dll_path.as_ptr(), &mut status, 0) };
    if status != MONO_IMAGE_OK {
        return Err(BootstrapError::AssemblyLoad {
            path: target.to_path_buf(),
            status,
        });
    }
    debug!("Loaded assembly {:p} from image {:p}", assembly, image);

    let method_desc_new = required(api.method_desc_new, "mono_method_desc_new")?;
    let method_desc_search_in_image = required(api.method_desc_search_in_image, "mono_method_desc_search_in_image")?;
    let method_signature = required(api.method_signature, "mono_method_signature")?;
    let signature_get_param_count = required(api.signature_get_param_count, "mono_signature_get_param_count")?;
    let runtime_invoke = required(api.runtime_invoke, "mono_runtime_invoke")?;

    let desc = MethodDesc {
        raw: unsafe { method_desc_new(c"*:Main".as_ptr(), 0) },
        free: api.method_desc_free,
    };
    let method = unsafe { method_desc_search_in_image(desc.raw, image) };
    if method.is_null() {
        return Err(BootstrapError::EntryPointMissing(ENTRY_POINT));
    }

    let signature = unsafe { method_signature(method) };
    let param_count = unsafe { signature_get_param_count(signature) };

    let mut args: Option<Vec<*mut c_void>> = match param_count {
        0 => None,
        1 => {
            let array_new = required(api.array_new, "mono_array_new")?;
            let get_string_class = required(api.get_string_class, "mono_get_string_class")?;
            let array = unsafe { array_new(domain, get_string_class(), 0) };
            Some(vec![array])
        }
        n => {
            warn!("Entry point takes {} parameters; invoking it without arguments", n);
            None
        }
    };
    let args_ptr = args.as_mut().map_or(ptr::null_mut(), |args| args.as_mut_ptr());

    info!("Invoking method {:p}", method);
    let mut exc: *mut c_void = ptr::null_mut();
    unsafe { runtime_invoke(method, ptr::null_mut(), args_ptr, &mut exc) };

    if exc.is_null() {
        Ok(Outcome::Invoked)
    } else {
        Ok(Outcome::Threw(exception::describe(api, exc)))
    }
}
