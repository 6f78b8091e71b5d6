//! Process-facing backend: symbol resolution, library loading, flavor detection

pub mod traits;
pub mod detection;
pub mod library;

pub use traits::*;
pub use detection::{FlavorLatch, ManagedHandle, RuntimeFlavor};
pub use library::{BorrowedModule, SharedLibrary, SystemLoader};
