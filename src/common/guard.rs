//! Re-entry guard
//!
//! `DOORSTOP_INITIALIZED` is the only record that a bootstrap already ran.
//! It is never cleared.

use std::ffi::OsStr;

use super::env::{INITIALIZED, TRUTHY};
use crate::backend::EnvStore;

/// Whether a bootstrap already ran in this process
pub fn is_initialized(env: &impl EnvStore) -> bool {
    env.contains(INITIALIZED)
}

/// Check and set the latch in one step
///
/// Returns `true` when the caller owns the bootstrap, `false` when it already ran.
pub fn try_acquire(env: &impl EnvStore) -> bool {
    if is_initialized(env) {
        return false;
    }
    env.set(INITIALIZED, OsStr::new(TRUTHY));
    true
}
