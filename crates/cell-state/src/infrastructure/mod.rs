pub mod clock;
pub mod context;
pub mod outbox_driver;
pub mod yaml_store;
