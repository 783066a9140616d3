pub mod api;
pub mod audit;
pub mod auth;
pub mod cli;
pub mod config;
pub mod context;
pub mod features;
pub mod logging;
pub mod metrics;
pub mod reports;
pub mod server;
pub mod store;
pub mod terminal;
pub mod utils;
