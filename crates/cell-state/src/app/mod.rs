//! Application module
//!
//! Wiring and lifecycle of the cell state daemon.

pub mod builder;
pub mod core;
pub mod services;
pub mod tasks;

// Re-export main types
pub use builder::build_manager;
pub use builder::ApplicationBuilder;
pub use core::Application;
pub use services::ApplicationServices;
