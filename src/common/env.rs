//! Environment variables shared with the loaded assembly

use std::ffi::{OsStr, OsString};

use log::debug;

use crate::backend::EnvStore;

/// Present once the bootstrap has run in this process (or an ancestor)
pub const INITIALIZED: &str = "DOORSTOP_INITIALIZED";
/// The runtime's managed root directory
pub const MANAGED_FOLDER_DIR: &str = "DOORSTOP_MANAGED_FOLDER_DIR";
/// Absolute path of the host executable
pub const PROCESS_PATH: &str = "DOORSTOP_PROCESS_PATH";
/// Effective assembly search path, `;`-joined, override first
pub const DLL_SEARCH_DIRS: &str = "DOORSTOP_DLL_SEARCH_DIRS";
/// The target assembly that was invoked
pub const INVOKE_DLL_PATH: &str = "DOORSTOP_INVOKE_DLL_PATH";

/// Value written to [`INITIALIZED`]
pub const TRUTHY: &str = "TRUE";

/// The real process environment
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl EnvStore for ProcessEnv {
    fn get(&self, key: &str) -> Option<OsString> {
        std::env::var_os(key)
    }

    fn set(&self, key: &str, value: &OsStr) {
        std::env::set_var(key, value);
    }
}

/// Export `value` under `key` and log it
pub fn publish(env: &impl EnvStore, key: &str, value: impl AsRef<OsStr>) {
    let value = value.as_ref();
    debug!("{} = {}", key, value.to_string_lossy());
    env.set(key, value);
}

/// Join search directories for [`DLL_SEARCH_DIRS`]
pub fn join_search_dirs<I, S>(dirs: I) -> OsString
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut joined = OsString::new();
    for (i, dir) in dirs.into_iter().enumerate() {
        if i > 0 {
            joined.push(";");
        }
        joined.push(dir.as_ref());
    }
    joined
}
