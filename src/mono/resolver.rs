//! Assembly resolver override
//!
//! Stands in for `mono_image_open_from_data_with_name`. When the override
//! directory holds a file with the same basename as the requested image,
//! that file's bytes are opened instead of the caller's. Runs on any host
//! thread; it only reads its own immutable settings.

use std::ffi::{c_char, c_void, CStr};
use std::path::PathBuf;
use std::ptr;

use log::{debug, warn};

use super::api::{ImageOpenFn, ImageOpenStatus};
use crate::common::paths::{file_exists, file_name, read_file};

#[derive(Debug, Clone, Default)]
pub struct ImageResolver {
    override_dir: Option<PathBuf>,
    open: Option<ImageOpenFn>,
}

impl ImageResolver {
    /// `open` is the real image-open function every call ends up in
    pub fn new(override_dir: Option<PathBuf>, open: Option<ImageOpenFn>) -> Self {
        ImageResolver { override_dir, open }
    }

    /// The real image-open function
    pub fn original(&self) -> Option<ImageOpenFn> {
        self.open
    }

    /// Bytes of `override_dir/basename(name)` when that file exists
    pub fn lookup(&self, name: &str) -> Option<Vec<u8>> {
        let dir = self.override_dir.as_ref()?;
        let base = file_name(name);
        if base.is_empty() {
            return None;
        }

        let candidate = dir.join(base);
        if !file_exists(&candidate) {
            return None;
        }

        match read_file(&candidate) {
            Ok(bytes) => {
                debug!("Redirecting {} to {}", name, candidate.display());
                Some(bytes)
            }
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    /// Open an image, preferring the override directory
    ///
    /// # Safety
    /// Arguments follow the `mono_image_open_from_data_with_name` contract.
    pub unsafe fn open(
        &self,
        data: *mut c_char,
        data_len: u32,
        need_copy: i32,
        status: *mut ImageOpenStatus,
        refonly: i32,
        name: *const c_char,
    ) -> *mut c_void {
        let Some(open) = self.open else {
            return ptr::null_mut();
        };

        let mut result = ptr::null_mut();

        if !name.is_null() {
            let requested = CStr::from_ptr(name).to_string_lossy();
            if let Some(bytes) = self.lookup(&requested) {
                match u32::try_from(bytes.len()) {
                    Ok(len) if need_copy != 0 => {
                        let mut bytes = bytes;
                        result = open(bytes.as_mut_ptr().cast(), len, need_copy, status, refonly, name);
                        // the runtime made its own copy
                        drop(bytes);
                    }
                    Ok(len) => {
                        // Without a copy the image keeps pointing into the buffer for good
                        let bytes: &'static mut [u8] = Box::leak(bytes.into_boxed_slice());
                        result = open(bytes.as_mut_ptr().cast(), len, need_copy, status, refonly, name);
                    }
                    Err(_) => warn!("{} is too large to open from memory", requested),
                }
            }
        }

        if result.is_null() {
            result = open(data, data_len, need_copy, status, refonly, name);
        }
        result
    }
}
