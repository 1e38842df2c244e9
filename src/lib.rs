pub mod admin;
pub mod auth;
pub mod bridge;
pub mod config;
pub mod database;
pub mod error;
pub mod hs;
pub mod ids;
pub mod metrics;
pub mod puppet;
pub mod relay;
pub mod sim;
pub mod web;

pub const NAME: &str = "lighthouse-bridge";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
