//! Helpers shared by every runtime flavor

pub mod env;
pub mod guard;
pub mod paths;

pub use env::ProcessEnv;
pub use paths::HostPath;
