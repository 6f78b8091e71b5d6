//! IL2CPP runtime backend
//!
//! IL2CPP builds cannot load managed assemblies themselves; the hook starts a
//! sibling runtime and bootstraps into that instead.

pub mod api;
pub mod init;

pub use api::Il2CppApi;
pub use init::{init_il2cpp, SiblingRuntimes};
