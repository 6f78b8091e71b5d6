//! Mono runtime backend
//!
//! Covers both the host's own Mono (the `mono_jit_init_version` hook) and the
//! sibling Mono an IL2CPP host gets started next to it.

pub mod api;
pub mod bootstrap;
pub mod exception;
pub mod init;
pub mod resolver;

pub use api::MonoApi;
pub use init::init_mono;
pub use resolver::ImageResolver;
