pub mod api;
pub mod archive;
pub mod broadcast;
pub mod config;
pub mod humanize;
pub mod models;
pub mod observability;
pub mod retention;
pub mod scheduler;
pub mod store;

/// Boxed error used at job and process boundaries
pub type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;
