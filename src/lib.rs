pub mod catalog;
pub mod config;
pub mod dataset;
pub mod handlers;
pub mod observability;
pub mod preparer;
pub mod registry;
pub mod schema;
pub mod scripts;
pub mod storage;
pub mod tasks;
