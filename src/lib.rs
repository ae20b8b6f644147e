pub mod api;
pub mod clients;
pub mod config;
pub mod dedupe;
pub mod models;
pub mod policies;
pub mod scan;
pub mod store;
