pub mod config;
pub mod error;
pub mod event;
pub mod memory;
pub mod refresher;
pub mod report;
pub mod source;
pub mod store;
