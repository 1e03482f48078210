pub mod analytics;
pub mod config;
pub mod fetch;
pub mod records;
pub mod store;
pub mod sync;
