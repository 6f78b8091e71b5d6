//! Terminal states of a bootstrap pass

use std::panic::{catch_unwind, AssertUnwindSafe};

use log::{error, info, warn};

use crate::backend::RuntimeFlavor;
use crate::error::{BootstrapError, Result};

/// How a bootstrap pass ended, when it did not fail outright
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The re-entry latch was already set
    Skipped,
    /// The entry point ran and returned normally
    Invoked,
    /// The entry point threw; carries the exception text when it could be read
    Threw(Option<String>),
    /// The entry point returned a non-zero status code
    ExitCode(i32),
}

/// Log the end of a bootstrap pass and swallow the error
pub fn conclude(runtime: RuntimeFlavor, result: Result<Outcome>) -> Option<Outcome> {
    match result {
        Ok(outcome) => {
            match &outcome {
                Outcome::Skipped => info!("DOORSTOP_INITIALIZED is set! Skipping!"),
                Outcome::Invoked => info!("Done"),
                Outcome::Threw(Some(message)) => error!("Error message: {}", message),
                Outcome::Threw(None) => error!("Error invoking code"),
                Outcome::ExitCode(code) => error!("Entry point returned {:#x}", code),
            }
            Some(outcome)
        }
        Err(BootstrapError::RuntimeNotFound(path)) => {
            info!("{} startup files are not set up ({}), skipping", runtime, path.display());
            None
        }
        Err(e @ BootstrapError::EntryPointMissing(_)) => {
            warn!("{}", e);
            None
        }
        Err(e) => {
            error!("{} bootstrap failed: {}", runtime, e);
            None
        }
    }
}

/// Run `f`, turning a panic into a logged `None` so it never unwinds into the host
pub fn shielded<R>(what: &str, f: impl FnOnce() -> R) -> Option<R> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!("{} panicked: {}", what, message);
            None
        }
    }
}

/// Run `f`; when it panics, log it and return `fallback()` instead
pub fn shielded_or<R>(what: &str, f: impl FnOnce() -> R, fallback: impl FnOnce() -> R) -> R {
    shielded(what, f).unwrap_or_else(fallback)
}
