//! Managed exception reporting

use std::ffi::{c_void, CStr};
use std::ptr;

use super::api::MonoApi;

/// Text of a managed exception via `Object.ToString()`
///
/// `None` when the runtime lacks `object_to_string` or the call produced
/// nothing readable. Exceptions thrown by `ToString` itself are ignored.
pub fn describe(api: &MonoApi, exception: *mut c_void) -> Option<String> {
    if exception.is_null() {
        return None;
    }
    let object_to_string = api.object_to_string?;
    let string_to_utf8 = api.string_to_utf8?;

    let managed = unsafe { object_to_string(exception, ptr::null_mut()) };
    if managed.is_null() {
        return None;
    }

    let utf8 = unsafe { string_to_utf8(managed) };
    if utf8.is_null() {
        return None;
    }
    let text = unsafe { CStr::from_ptr(utf8) }.to_string_lossy().into_owned();

    if let Some(free) = api.free {
        unsafe { free(utf8.cast()) };
    }

    Some(text)
}
