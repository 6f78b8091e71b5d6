//! Managed-runtime bootstrap
//!
//! Injected into a host that embeds Mono, IL2CPP or CoreCLR. The host's
//! runtime-initialization call is intercepted ([`hooks::try_hook`]); once the
//! real runtime is up, a configured managed assembly is loaded and its entry
//! point invoked exactly once per process. IL2CPP hosts get a sibling Mono
//! (or CoreCLR) runtime started next to them for that purpose.
//!
//! Failures are logged and swallowed: the host always sees the result of its
//! own runtime call.

#[macro_use]
mod macros;

pub mod backend;
pub mod common;
pub mod config;
pub mod error;
pub mod hooks;
pub mod outcome;

#[cfg(feature = "coreclr")]
pub mod coreclr;
#[cfg(feature = "il2cpp")]
pub mod il2cpp;
#[cfg(feature = "mono")]
pub mod mono;

#[cfg(test)]
mod testing;

pub use backend::RuntimeFlavor;
pub use config::Config;
pub use error::BootstrapError;
pub use hooks::{detected_flavor, install_config, try_hook};
pub use outcome::Outcome;
