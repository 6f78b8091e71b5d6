//! Bootstrap configuration
//!
//! Parsing command lines and config files belongs to the injector; it hands
//! over a populated [`Config`] through [`ConfigSlot::install`]. The bootstrap
//! only reads it and releases it exactly once.

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use serde::Deserialize;

use crate::backend::EnvStore;
use crate::error::BootstrapError;

/// Env var that disables the bootstrap unless `ignore_disabled_env` is set
pub const DISABLE_ENV: &str = "DOORSTOP_DISABLE";

/// Paths and switches the bootstrap consumes
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub enabled: bool,
    pub ignore_disabled_env: bool,
    pub redirect_output_log: bool,
    /// Managed assembly to load and invoke
    pub target_assembly: Option<PathBuf>,
    /// Directory searched first for every assembly the runtime opens from memory
    pub mono_dll_search_path_override: Option<PathBuf>,
    // IL2CPP sibling Mono
    pub mono_lib_dir: Option<PathBuf>,
    pub mono_corlib_dir: Option<PathBuf>,
    pub mono_config_dir: Option<PathBuf>,
    // IL2CPP sibling CoreCLR
    pub clr_corlib_dir: Option<PathBuf>,
    pub clr_runtime_coreclr_path: Option<PathBuf>,
}

fn parse_bool(value: OsString) -> bool {
    matches!(
        value.to_string_lossy().trim().to_ascii_lowercase().as_str(),
        "1" | "true"
    )
}

fn non_empty_path(value: OsString) -> Option<PathBuf> {
    if value.is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

impl Config {
    /// Parse a JSON document whose keys are the field names
    pub fn from_json(text: &str) -> Result<Self, BootstrapError> {
        serde_json::from_str(text).map_err(|e| BootstrapError::Config(e.to_string()))
    }

    /// Build a config from `DOORSTOP_*` environment variables
    pub fn from_env(env: &impl EnvStore) -> Self {
        let flag = |key: &str| env.get(key).map(parse_bool).unwrap_or(false);
        let path = |key: &str| env.get(key).and_then(non_empty_path);

        Config {
            enabled: flag("DOORSTOP_ENABLED"),
            ignore_disabled_env: flag("DOORSTOP_IGNORE_DISABLED_ENV"),
            redirect_output_log: flag("DOORSTOP_REDIRECT_OUTPUT_LOG"),
            target_assembly: path("DOORSTOP_TARGET_ASSEMBLY"),
            mono_dll_search_path_override: path("DOORSTOP_MONO_DLL_SEARCH_PATH_OVERRIDE"),
            mono_lib_dir: path("DOORSTOP_MONO_LIB_DIR"),
            mono_corlib_dir: path("DOORSTOP_MONO_CORLIB_DIR"),
            mono_config_dir: path("DOORSTOP_MONO_CONFIG_DIR"),
            clr_corlib_dir: path("DOORSTOP_CLR_CORLIB_DIR"),
            clr_runtime_coreclr_path: path("DOORSTOP_CLR_RUNTIME_CORECLR_PATH"),
        }
    }

    /// The injector's gate: enabled, and not vetoed through `DOORSTOP_DISABLE`
    pub fn should_bootstrap(&self, env: &impl EnvStore) -> bool {
        self.enabled && (self.ignore_disabled_env || !env.contains(DISABLE_ENV))
    }

    /// Whether IL2CPP should start CoreCLR instead of Mono as its sibling
    pub fn wants_coreclr(&self) -> bool {
        self.clr_runtime_coreclr_path.is_some() && self.clr_corlib_dir.is_some()
    }
}

/// Single owner of the process configuration
///
/// The bootstrap moves the config out with [`ConfigSlot::take`]; dropping the
/// taken value is the release. Later takes find the slot empty.
#[derive(Debug, Default)]
pub struct ConfigSlot(Mutex<Option<Config>>);

impl ConfigSlot {
    pub const fn new() -> Self {
        ConfigSlot(Mutex::new(None))
    }

    pub fn with_config(config: Config) -> Self {
        ConfigSlot(Mutex::new(Some(config)))
    }

    fn lock(&self) -> MutexGuard<'_, Option<Config>> {
        // A panic while holding the lock cannot leave the Option half-written
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Install the config; returns the one it replaced, if any
    pub fn install(&self, config: Config) -> Option<Config> {
        self.lock().replace(config)
    }

    /// Read from the config while it is still installed
    pub fn peek<R>(&self, f: impl FnOnce(&Config) -> R) -> Option<R> {
        self.lock().as_ref().map(f)
    }

    /// Move the config out of the slot
    pub fn take(&self) -> Option<Config> {
        self.lock().take()
    }

    pub fn is_released(&self) -> bool {
        self.lock().is_none()
    }
}
