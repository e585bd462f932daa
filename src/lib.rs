pub mod app;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod output;
pub mod query;
pub mod summary;
