pub mod api;
pub mod app;
pub mod config;
mod domain;
mod infrastructure;

// Re-export main modules
pub use domain::cells;
pub use infrastructure::clock;
pub use infrastructure::context;
pub use infrastructure::outbox_driver;
pub use infrastructure::yaml_store;
