//! CoreCLR runtime backend

pub mod api;
pub mod bootstrap;

pub use api::CoreClrApi;
pub use bootstrap::initialize_hooked;
