//! Path and text helpers
//!
//! Runtimes take narrow (UTF-8 / raw byte) C strings while the host keeps
//! native paths. [`HostPath`] holds both so a path is converted once.

use std::ffi::{c_char, CStr, CString, OsString};
use std::path::{Path, PathBuf};

use sysinfo::System;

use crate::error::BootstrapError;

/// Separator Mono expects between entries of its assemblies path
#[cfg(windows)]
pub const SEARCH_PATH_SEPARATOR: &str = ";";
#[cfg(not(windows))]
pub const SEARCH_PATH_SEPARATOR: &str = ":";

/// A filesystem path together with its narrow C-string encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPath {
    path: PathBuf,
    narrow: CString,
}

impl HostPath {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, BootstrapError> {
        let path = path.into();
        let narrow = narrow(path.as_os_str())?;
        Ok(HostPath { path, narrow })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn narrow(&self) -> &CStr {
        &self.narrow
    }

    pub fn as_ptr(&self) -> *const c_char {
        self.narrow.as_ptr()
    }
}

/// Encode a native string as a NUL-terminated narrow string
pub fn narrow(text: &std::ffi::OsStr) -> Result<CString, BootstrapError> {
    #[cfg(unix)]
    let bytes = {
        use std::os::unix::ffi::OsStrExt;
        text.as_bytes().to_vec()
    };

    #[cfg(not(unix))]
    let bytes = text.to_string_lossy().into_owned().into_bytes();

    CString::new(bytes).map_err(|_| BootstrapError::InteriorNul(text.to_string_lossy().into_owned()))
}

/// Decode a narrow C string handed out by a runtime
///
/// # Safety
/// `ptr` must be null or point at a NUL-terminated string.
pub unsafe fn widen(ptr: *const c_char) -> Option<OsString> {
    if ptr.is_null() {
        return None;
    }
    let bytes = CStr::from_ptr(ptr).to_bytes();

    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        Some(std::ffi::OsStr::from_bytes(bytes).to_os_string())
    }

    #[cfg(not(unix))]
    {
        Some(OsString::from(String::from_utf8_lossy(bytes).into_owned()))
    }
}

/// Resolve `path` against the current directory; falls back to the input
pub fn full_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Last component of `name`, treating both `/` and `\` as separators
pub fn file_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Parent directory of `path`, or `path` itself when it has none
pub fn folder_name(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => path.to_path_buf(),
    }
}

pub fn file_exists(path: &Path) -> bool {
    path.is_file()
}

pub fn folder_exists(path: &Path) -> bool {
    path.is_dir()
}

/// Read a whole file
pub fn read_file(path: &Path) -> Result<Vec<u8>, BootstrapError> {
    std::fs::read(path).map_err(|source| BootstrapError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Absolute path of the host executable
pub fn program_path() -> Option<PathBuf> {
    let from_sysinfo = sysinfo::get_current_pid().ok().and_then(|pid| {
        let mut system = System::new();
        system.refresh_process(pid);
        system.process(pid).and_then(|p| p.exe()).map(Path::to_path_buf)
    });

    from_sysinfo.or_else(|| std::env::current_exe().ok())
}
